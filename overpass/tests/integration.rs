//! Tests d'intégration avec une réponse Overpass réaliste

use std::path::Path;

use overpass::{BoundingBox, HighwayFilter};

fn load_fixture() -> Vec<u8> {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/trails.json");
    std::fs::read(&fixture_path).expect("fixture trails.json")
}

#[test]
fn test_parse_fixture() {
    let data = load_fixture();
    let filter = HighwayFilter::default();

    let result = overpass::parse_response(&data, Some(&filter)).unwrap();

    // Le way à un seul vertex est ignoré
    assert_eq!(result.features.len(), 3);
    assert_eq!(result.skipped, 1);
    assert!(result.remark.is_none());

    let ids: Vec<i64> = result.features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![28374651, 28374652, 28374653]);

    for feature in &result.features {
        assert!(feature.vertex_count() >= 2, "way {} too short", feature.id);
    }

    let cedar = &result.features[0];
    assert_eq!(cedar.tags.name.as_deref(), Some("Cedar Ridge Trail"));
    assert_eq!(cedar.vertex_count(), 4);

    let track = &result.features[1];
    assert_eq!(track.tags.highway.as_deref(), Some("track"));
    assert_eq!(track.tags.name, None);
    assert_eq!(track.tags.surface.as_deref(), Some("gravel"));
}

#[test]
fn test_fixture_within_query_bbox() {
    let data = load_fixture();
    let result = overpass::parse_response(&data, None).unwrap();

    let bbox = BoundingBox::new(-120.0, 30.0, -119.9, 30.1).unwrap();
    for feature in &result.features {
        for coord in feature.geometry.coords() {
            assert!(
                bbox.contains(coord.x, coord.y),
                "way {} leaves the queried bbox",
                feature.id
            );
        }
    }
}

#[test]
fn test_query_for_fixture_bbox() {
    let bbox = BoundingBox::new(-120.0, 30.0, -119.9, 30.1).unwrap();
    let query = overpass::build_query(&bbox, &HighwayFilter::default(), 25);

    assert!(query.starts_with("[out:json][timeout:25];"));
    assert!(query.contains("(30,-120,30.1,-119.9)"));
    assert!(query.ends_with("out geom;"));
}
