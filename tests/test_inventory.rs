mod common;

use common::image_name;
use scenealign::io::MetadataTable;
use scenealign::Inventory;
use std::path::Path;
use tempfile::TempDir;

fn write_sidecar(dir: &Path, scene: &str, cloud_cover: f64, clear: Option<u32>) {
    let clear = clear
        .map(|v| format!(r#", "clear_confidence_percent": {}"#, v))
        .unwrap_or_default();
    let json = format!(
        r#"{{"id": "{scene}", "type": "Feature", "properties": {{
            "cloud_cover": {cloud_cover},
            "quality_category": "standard",
            "heavy_haze_percent": 0,
            "visible_confidence_percent": 100{clear}
        }}}}"#
    );
    std::fs::write(dir.join(format!("{}_metadata.json", scene)), json).unwrap();
}

#[test]
fn test_inventory_flags_fullest_and_pristine() {
    common::init_logging();
    let root = TempDir::new().expect("Failed to create temp directory");
    let images = root.path().join("files");
    std::fs::create_dir_all(&images).unwrap();

    common::write_image(&images.join(image_name("scene_a")), 10, 12, 0, 0);
    write_sidecar(&images, "scene_a", 0.0, Some(100));
    common::write_image(&images.join(image_name("scene_b")), 5, 6, 2, 3);
    write_sidecar(&images, "scene_b", 0.05, Some(100));
    common::write_image(&images.join(image_name("scene_c")), 10, 12, 0, 0);
    write_sidecar(&images, "scene_c", 0.3, None);
    // masks and sidecars are not scenes
    common::write_mask(&images.join(common::mask_name("scene_a")), 10, 12, 0, 0, &[]);

    let inventory = Inventory::default();
    let table = inventory.scan(&images).expect("Inventory scan failed");
    assert_eq!(table.len(), 3);

    let a = table.get(&image_name("scene_a")).unwrap();
    assert_eq!((a.width, a.height, a.band_count), (12, 10, 4));
    assert!(a.is_fullest());
    assert!(a.is_pristine());
    assert!(!table.get(&image_name("scene_b")).unwrap().is_fullest());
    let c = table.get(&image_name("scene_c")).unwrap();
    assert!(c.is_fullest());
    assert_eq!(c.clear_confidence_percent, -1.0);

    let table_path = root.path().join("images_info.csv");
    let selected = root.path().join("tmp").join("selected");
    let output = inventory
        .write(&table, &table_path, &images, Some(&selected))
        .expect("Inventory write failed");

    assert_eq!(output.pristine, vec![image_name("scene_a")]);
    assert!(selected.join(image_name("scene_a")).is_file());
    assert!(!selected.join(image_name("scene_c")).exists());

    let fullest = MetadataTable::read_csv(output.fullest_path.unwrap()).unwrap();
    assert_eq!(fullest.len(), 2);

    let reread = MetadataTable::read_csv(&table_path).unwrap();
    assert_eq!(reread.len(), 3);
    assert_eq!(reread.get(&image_name("scene_b")).unwrap().cloud_cover, 0.05);
    assert_eq!(reread.get(&image_name("scene_b")).unwrap().masked, None);
}

#[test]
fn test_missing_sidecar_is_an_error() {
    let root = TempDir::new().unwrap();
    common::write_image(&root.path().join(image_name("scene_a")), 4, 4, 0, 0);
    assert!(Inventory::default().scan(root.path()).is_err());
}
