use std::path::Path;

use image::{Rgb, RgbImage};

use ferrite_cls::data::{read_split, ClassIndex, CLASS_INDICES_FILE};

fn write_image(path: &Path) {
    RgbImage::from_pixel(6, 4, Rgb([120, 80, 40])).save(path).unwrap();
}

#[test]
fn cat_dog_fixture_indexes_three_images_per_class() {
    let root = tempfile::tempdir().unwrap();
    // Created out of order to make sure sorting, not creation order, wins.
    for class in ["dog", "cat"] {
        let dir = root.path().join("train").join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["c.png", "a.jpg", "b.PNG"] {
            write_image(&dir.join(name));
        }
        std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();
    }

    let index = read_split(root.path(), "train").unwrap();
    assert_eq!(index.classes.names(), &["cat".to_string(), "dog".to_string()]);
    assert_eq!(index.per_class_counts, vec![3, 3]);
    assert_eq!(index.len(), 6);

    let labels: Vec<usize> = index.samples.iter().map(|s| s.label).collect();
    assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
    let first_cat: Vec<String> = index.samples[..3]
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(first_cat, vec!["a.jpg", "b.PNG", "c.png"]);

    let written = std::fs::read_to_string(root.path().join(CLASS_INDICES_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json, serde_json::json!({"0": "cat", "1": "dog"}));
    assert_eq!(written, "{\n    \"0\": \"cat\",\n    \"1\": \"dog\"\n}");

    let reloaded = ClassIndex::load_json(&root.path().join(CLASS_INDICES_FILE)).unwrap();
    assert_eq!(reloaded, index.classes);
}

#[test]
fn rebuilding_gives_identical_ids() {
    let root = tempfile::tempdir().unwrap();
    for class in ["zebra", "ant", "moose"] {
        let dir = root.path().join("val").join(class);
        std::fs::create_dir_all(&dir).unwrap();
        write_image(&dir.join("x.jpg"));
    }
    let a = read_split(root.path(), "val").unwrap();
    let b = read_split(root.path(), "val").unwrap();
    assert_eq!(a.classes, b.classes);
    assert_eq!(a.classes.id("ant"), Some(0));
    assert_eq!(a.classes.id("moose"), Some(1));
    assert_eq!(a.classes.name(2), Some("zebra"));
}
