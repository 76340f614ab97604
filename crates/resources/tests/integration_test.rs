//! Integration tests for texture and material loading.

use std::path::PathBuf;

use engine_resources::{CubemapData, MaterialSource, ResourceError, TextureData};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("engine-resources-{}-{}", std::process::id(), name))
}

#[test]
fn test_load_png_texture() {
    let path = temp_path("checker.png");

    let source = TextureData::checker(8, 2, [255, 0, 0, 255], [0, 0, 255, 255]);
    image::RgbaImage::from_raw(source.width, source.height, source.pixels.clone())
        .expect("Failed to wrap pixels")
        .save(&path)
        .expect("Failed to write test image");

    let loaded = MaterialSource::File(path.clone())
        .load()
        .expect("Failed to load texture");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.width, 8);
    assert_eq!(loaded.height, 8);
    assert_eq!(loaded.pixels, source.pixels);
}

#[test]
fn test_rgb_image_is_expanded_to_rgba() {
    let path = temp_path("rgb.png");

    image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
        .save(&path)
        .expect("Failed to write test image");

    let loaded = TextureData::load(&path).expect("Failed to load texture");
    let _ = std::fs::remove_file(&path);

    assert_eq!((loaded.width, loaded.height), (3, 2));
    assert_eq!(loaded.pixels.len(), 3 * 2 * 4);
    assert_eq!(&loaded.pixels[0..4], &[10, 20, 30, 255]);
}

#[test]
fn test_undecodable_file() {
    let path = temp_path("garbage.png");
    std::fs::write(&path, b"not an image").expect("Failed to write test file");

    let result = TextureData::load(&path);
    let _ = std::fs::remove_file(&path);

    match result {
        Err(ResourceError::Image { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[test]
fn test_load_cubemap_faces() {
    let paths: Vec<PathBuf> = (0..6).map(|i| temp_path(&format!("face{}.png", i))).collect();
    for path in &paths {
        image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]))
            .save(path)
            .expect("Failed to write face");
    }

    let result = CubemapData::load([
        &paths[0], &paths[1], &paths[2], &paths[3], &paths[4], &paths[5],
    ]);
    for path in &paths {
        let _ = std::fs::remove_file(path);
    }

    let cubemap = result.expect("Failed to load cube map");
    assert_eq!(cubemap.size(), (4, 4));
}
