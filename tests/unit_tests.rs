use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use yolo_dataset_prep::config::ConvertArgs;
use yolo_dataset_prep::conversion::{
    convert_record, convert_shape_to_yolo, resolve_image, ConvertError,
};
use yolo_dataset_prep::dataset::{discover_classes, process_dataset, split_indices};
use yolo_dataset_prep::io::{setup_output_directories, write_manifest};
use yolo_dataset_prep::types::{ImageAnnotation, ResolvedImage, Shape};
use yolo_dataset_prep::utils::infer_image_format;

fn shape(label: &str, shape_type: &str, points: Vec<(f64, f64)>) -> Shape {
    Shape {
        label: label.to_string(),
        points,
        group_id: None,
        shape_type: shape_type.to_string(),
        description: None,
        mask: None,
    }
}

fn annotation(image_path: &str, shapes: Vec<Shape>) -> ImageAnnotation {
    ImageAnnotation {
        version: "5.0.1".to_string(),
        flags: None,
        shapes,
        image_path: image_path.to_string(),
        image_data: None,
        image_height: 32,
        image_width: 32,
    }
}

fn class_map(labels: &[&str]) -> HashMap<String, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(id, label)| (label.to_string(), id))
        .collect()
}

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::new(width, height).save(path).unwrap();
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn write_labelme_json(path: &Path, image_path: &str, label: &str) {
    let json = serde_json::json!({
        "version": "5.0.1",
        "flags": {},
        "shapes": [{
            "label": label,
            "points": [[8.0, 8.0], [24.0, 16.0]],
            "group_id": null,
            "shape_type": "rectangle"
        }],
        "imagePath": image_path,
        "imageData": null,
        "imageHeight": 32,
        "imageWidth": 32
    });
    fs::write(path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
}

#[test]
fn test_infer_image_format() {
    assert_eq!(infer_image_format(&[0xFF, 0xD8, 0xFF]), Some("jpg"));
    assert_eq!(infer_image_format(&[0x89, b'P', b'N', b'G']), Some("png"));
    assert_eq!(infer_image_format(b"BM"), Some("bmp"));
    assert_eq!(infer_image_format(&[0x47, 0x49, 0x46]), Some("gif"));
    assert_eq!(infer_image_format(&[0x00, 0x00, 0x00]), None);
}

#[test]
fn test_convert_rectangle_shape() {
    let map = class_map(&["cat"]);
    let shape = shape("cat", "rectangle", vec![(10.0, 10.0), (20.0, 20.0)]);

    let line = convert_shape_to_yolo(&shape, 100, 100, &map).unwrap();
    assert_eq!(line, "0 0.150000 0.150000 0.100000 0.100000");
}

#[test]
fn test_convert_rectangle_reversed_corners() {
    let map = class_map(&["cat"]);
    let forward = shape("cat", "rectangle", vec![(10.0, 10.0), (20.0, 20.0)]);
    let reversed = shape("cat", "rectangle", vec![(20.0, 20.0), (10.0, 10.0)]);

    assert_eq!(
        convert_shape_to_yolo(&forward, 100, 100, &map),
        convert_shape_to_yolo(&reversed, 100, 100, &map)
    );
}

#[test]
fn test_non_rectangle_shapes_are_skipped() {
    let map = class_map(&["cat"]);

    let polygon = shape(
        "cat",
        "polygon",
        vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
    );
    assert!(convert_shape_to_yolo(&polygon, 100, 100, &map).is_none());

    let malformed = shape(
        "cat",
        "rectangle",
        vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
    );
    assert!(convert_shape_to_yolo(&malformed, 100, 100, &map).is_none());

    let unknown_label = shape("dog", "rectangle", vec![(0.0, 0.0), (10.0, 10.0)]);
    assert!(convert_shape_to_yolo(&unknown_label, 100, 100, &map).is_none());
}

#[test]
fn test_discover_classes_sorted_and_deduplicated() {
    let annotations = vec![
        (
            PathBuf::from("a.json"),
            Some(annotation(
                "a.png",
                vec![
                    shape("dog", "rectangle", vec![(0.0, 0.0), (1.0, 1.0)]),
                    shape("cat", "polygon", vec![(0.0, 0.0), (1.0, 1.0)]),
                ],
            )),
        ),
        (
            PathBuf::from("b.json"),
            Some(annotation(
                "b.png",
                vec![
                    shape("cat", "rectangle", vec![(0.0, 0.0), (1.0, 1.0)]),
                    shape("ant", "rectangle", vec![(0.0, 0.0), (1.0, 1.0)]),
                ],
            )),
        ),
        (PathBuf::from("c.json"), None),
    ];

    let classes = discover_classes(&annotations);
    assert_eq!(classes, vec!["ant", "cat", "dog"]);
}

#[test]
fn test_split_indices_sizes_and_disjointness() {
    let assignment = split_indices(10, 0.7, 0.2, 42);
    assert_eq!(assignment.train.len(), 7);
    assert_eq!(assignment.val.len(), 2);
    assert!(assignment.train.is_disjoint(&assignment.val));

    let test_count = (0..10)
        .filter(|i| !assignment.train.contains(i) && !assignment.val.contains(i))
        .count();
    assert_eq!(test_count, 1);
}

#[test]
fn test_split_indices_deterministic() {
    let first = split_indices(100, 0.7, 0.2, 42);
    let second = split_indices(100, 0.7, 0.2, 42);
    assert_eq!(first.train, second.train);
    assert_eq!(first.val, second.val);
}

#[test]
fn test_resolve_image_via_source_dir_lookup() {
    let temp = tempfile::tempdir().unwrap();
    let img_dir = temp.path().join("cat_image");
    fs::create_dir(&img_dir).unwrap();
    write_png(&img_dir.join("img0.png"), 4, 6);

    // relative reference with a parent-directory component
    let record = annotation("../cat_image/img0.png", vec![]);
    let (resolved, w, h) = resolve_image(&record, &img_dir).unwrap();
    assert_eq!(w, 4);
    assert_eq!(h, 6);
    match resolved {
        ResolvedImage::OnDisk(path) => assert_eq!(path, img_dir.join("img0.png")),
        other => panic!("expected on-disk image, got {:?}", other),
    }
}

#[test]
fn test_resolve_image_missing_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let record = annotation("nope.png", vec![]);

    match resolve_image(&record, temp.path()) {
        Err(ConvertError::ImageNotFound(path)) => {
            assert_eq!(path, temp.path().join("nope.png"));
        }
        other => panic!("expected ImageNotFound, got {:?}", other),
    }
}

#[test]
fn test_resolve_image_embedded_data_fallback() {
    let temp = tempfile::tempdir().unwrap();
    let mut record = annotation("missing/photo.png", vec![]);
    record.image_data = Some(base64::encode(png_bytes(5, 3)));

    let (resolved, w, h) = resolve_image(&record, temp.path()).unwrap();
    assert_eq!((w, h), (5, 3));
    match resolved {
        ResolvedImage::Embedded { file_name, bytes } => {
            assert_eq!(file_name, "photo.png");
            assert_eq!(infer_image_format(&bytes), Some("png"));
        }
        other => panic!("expected embedded image, got {:?}", other),
    }
}

#[test]
fn test_convert_record_lines() {
    let temp = tempfile::tempdir().unwrap();
    write_png(&temp.path().join("img0.png"), 32, 32);

    let record = annotation(
        "img0.png",
        vec![
            shape("cat", "rectangle", vec![(8.0, 8.0), (24.0, 16.0)]),
            shape("cat", "polygon", vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]),
        ],
    );
    let map = class_map(&["cat"]);

    let (_, lines) = convert_record(&record, temp.path(), &map).unwrap();
    assert_eq!(lines, vec!["0 0.500000 0.375000 0.500000 0.250000"]);
}

#[test]
fn test_process_dataset_materializes_embedded_images() {
    let temp = tempfile::tempdir().unwrap();
    let json_dir = temp.path().join("cat_label");
    let img_dir = temp.path().join("cat_image");
    let output = temp.path().join("data");
    fs::create_dir(&json_dir).unwrap();
    fs::create_dir(&img_dir).unwrap();

    // The referenced image is not on disk; only the embedded data exists
    let json = serde_json::json!({
        "version": "5.0.1",
        "flags": {},
        "shapes": [{
            "label": "cat",
            "points": [[8.0, 8.0], [24.0, 16.0]],
            "group_id": null,
            "shape_type": "rectangle"
        }],
        "imagePath": "../cat_image/photo.png",
        "imageData": base64::encode(png_bytes(32, 32)),
        "imageHeight": 32,
        "imageWidth": 32
    });
    fs::write(
        json_dir.join("photo.json"),
        serde_json::to_string(&json).unwrap(),
    )
    .unwrap();

    let args = ConvertArgs {
        json_dir,
        img_dir,
        output: output.clone(),
        train_size: 0.7,
        val_size: 0.2,
        seed: 42,
    };
    let stats = process_dataset(&args).unwrap();

    // a single record lands in test: floor(1*0.7) = floor(1*0.2) = 0
    assert_eq!(stats.test, 1);
    assert_eq!(stats.skipped, 0);

    let image_path = output.join("images/test/photo.png");
    let bytes = fs::read(&image_path).unwrap();
    assert_eq!(infer_image_format(&bytes), Some("png"));

    let label = fs::read_to_string(output.join("labels/test/photo.txt")).unwrap();
    assert_eq!(label, "0 0.500000 0.375000 0.500000 0.250000\n");
}

#[test]
fn test_write_manifest() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("data");
    let dirs = setup_output_directories(&output).unwrap();

    let classes = vec!["cat".to_string(), "dog".to_string()];
    let content = write_manifest(&output, &dirs, &classes).unwrap();

    assert_eq!(content, fs::read_to_string(output.join("data.yaml")).unwrap());
    assert!(content.contains(&format!("train: {}", dirs.img_train.display())));
    assert!(content.contains(&format!("val: {}", dirs.img_val.display())));
    assert!(content.contains(&format!("test: {}", dirs.img_test.display())));
    assert!(content.contains("nc: 2"));
    assert!(content.contains("names: ['cat', 'dog']"));
}

#[test]
fn test_process_dataset_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let json_dir = temp.path().join("cat_label");
    let img_dir = temp.path().join("cat_image");
    let output = temp.path().join("data");
    fs::create_dir(&json_dir).unwrap();
    fs::create_dir(&img_dir).unwrap();

    for i in 0..10 {
        let image_name = format!("img{}.png", i);
        write_png(&img_dir.join(&image_name), 32, 32);
        write_labelme_json(
            &json_dir.join(format!("img{}.json", i)),
            &format!("../cat_image/{}", image_name),
            if i % 2 == 0 { "cat" } else { "dog" },
        );
    }
    // One record whose image does not exist: skipped, not fatal
    write_labelme_json(&json_dir.join("broken.json"), "../cat_image/gone.png", "cat");

    let args = ConvertArgs {
        json_dir,
        img_dir,
        output: output.clone(),
        train_size: 0.7,
        val_size: 0.2,
        seed: 42,
    };
    let stats = process_dataset(&args).unwrap();

    // 11 records: floor(11*0.7)=7 train, floor(11*0.2)=2 val, 2 test,
    // minus the skipped record from whichever split it landed in
    assert_eq!(stats.total_written(), 10);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].starts_with("broken.json:"));

    let count_files = |dir: &Path| fs::read_dir(dir).unwrap().count();
    let labels = output.join("labels");
    let images = output.join("images");
    assert_eq!(
        count_files(&labels.join("train"))
            + count_files(&labels.join("val"))
            + count_files(&labels.join("test")),
        10
    );
    assert_eq!(
        count_files(&images.join("train"))
            + count_files(&images.join("val"))
            + count_files(&images.join("test")),
        10
    );

    let manifest = fs::read_to_string(output.join("data.yaml")).unwrap();
    assert!(manifest.contains("nc: 2"));
    assert!(manifest.contains("names: ['cat', 'dog']"));
}
