//! Mosaic layout, rendering, and memoization over real filesets.

use bin_atlas::mosaic::{PageShape, Placement};

use super::test_utils::{dashboard, sync, write_healthy, Scratch};

const B1: &str = "D20190102T093000_IFCB927";

/// Page assignment, overlap, and bounds checks for a placement table.
fn assert_valid(placements: &[Placement], page: PageShape) {
    for p in placements {
        assert!(p.x + p.w <= page.width, "{p:?} exceeds page width");
        assert!(p.y + p.h <= page.height, "{p:?} exceeds page height");
    }
    for (i, a) in placements.iter().enumerate() {
        for b in &placements[i + 1..] {
            if a.page != b.page {
                continue;
            }
            let disjoint = a.x + a.w <= b.x
                || b.x + b.w <= a.x
                || a.y + a.h <= b.y
                || b.y + b.h <= a.y;
            assert!(disjoint, "{a:?} overlaps {b:?}");
        }
    }
}

#[tokio::test]
async fn reference_placement_scenario() {
    let scratch = Scratch::new();
    // one 1200x1000 (width x height) source image
    write_healthy(&scratch.root, B1, 1, 1200, 1000);
    let dashboard = dashboard(&scratch.db, &scratch.root);
    sync(&dashboard);

    let placements = dashboard
        .mosaic_coordinates(B1, PageShape::new(800, 600), 0.33)
        .await
        .unwrap();

    assert_eq!(placements.len(), 1);
    let p = placements[0];
    assert_eq!(p.page, 0);
    assert_eq!((p.x, p.y), (0, 0));
    assert_eq!((p.w, p.h), (396, 330));
    assert_eq!(p.roi, 1);
}

#[tokio::test]
async fn every_image_is_placed_within_bounds() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 100, 48, 36);
    let dashboard = dashboard(&scratch.db, &scratch.root);
    sync(&dashboard);

    let shape = PageShape::new(200, 150);
    let placements = dashboard.mosaic_coordinates(B1, shape, 0.5).await.unwrap();
    assert_eq!(placements.len(), 100);
    assert_valid(&placements, shape);
    // 100 thumbnails of 24x18 outgrow a single 200x150 page
    assert!(placements.iter().any(|p| p.page > 0));
}

#[tokio::test]
async fn coordinates_are_memoized_per_key() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 12, 20, 20);
    let dashboard = dashboard(&scratch.db, &scratch.root);
    sync(&dashboard);

    let shape = PageShape::new(400, 300);
    let first = dashboard.mosaic_coordinates(B1, shape, 0.33).await.unwrap();
    let second = dashboard.mosaic_coordinates(B1, shape, 0.33).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(dashboard.coordinate_computations(), 1);

    dashboard.invalidate_coordinates(B1, shape, 0.33);
    let third = dashboard.mosaic_coordinates(B1, shape, 0.33).await.unwrap();
    assert_eq!(first, third);
    assert_eq!(dashboard.coordinate_computations(), 2);
}

#[tokio::test]
async fn layouts_are_deterministic_across_processes() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 40, 31, 17);
    sync(&dashboard(&scratch.db, &scratch.root));

    let shape = PageShape::new(300, 200);
    let mut tables = Vec::new();
    for _ in 0..2 {
        let dashboard = dashboard(&scratch.db, &scratch.root);
        let placements = dashboard.mosaic_coordinates(B1, shape, 0.33).await.unwrap();
        tables.push(serde_json::to_vec(&placements).unwrap());
    }
    assert_eq!(tables[0], tables[1]);
}

#[tokio::test]
async fn rendered_page_composites_the_thumbnails() {
    let scratch = Scratch::new();
    // ROI 1 is a constant gray of 7
    write_healthy(&scratch.root, B1, 1, 100, 80);
    let dashboard = dashboard(&scratch.db, &scratch.root);
    sync(&dashboard);

    let shape = PageShape::new(200, 150);
    let canvas = dashboard
        .render_mosaic_page(B1, 0, shape, 0.5, 200)
        .await
        .unwrap();

    assert_eq!((canvas.width(), canvas.height()), (200, 150));
    // the 50x40 thumbnail sits at the origin
    assert_eq!(canvas.get_pixel(0, 0).0[0], 7);
    assert_eq!(canvas.get_pixel(49, 39).0[0], 7);
    // background everywhere else
    assert_eq!(canvas.get_pixel(60, 50).0[0], 200);
    assert_eq!(canvas.get_pixel(199, 149).0[0], 200);
}

#[tokio::test]
async fn uncommitted_samples_have_no_mosaic() {
    let scratch = Scratch::new();
    write_healthy(&scratch.root, B1, 5, 10, 10);
    let dashboard = dashboard(&scratch.db, &scratch.root);
    // no sync: the sample is unknown to the catalog

    let result = dashboard
        .mosaic_coordinates(B1, PageShape::new(800, 600), 0.33)
        .await;
    assert!(matches!(
        result,
        Err(bin_atlas::MosaicError::SampleNotFound(_))
    ));
}
