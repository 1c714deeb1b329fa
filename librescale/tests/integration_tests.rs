use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use image::codecs::gif::GifEncoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Delay, Frame, ImageFormat, ImageReader, Rgba, RgbaImage};
use tempfile::TempDir;

use rescale::{OutputFormat, PipelineOptions, RescaleError, ResourceLimits};

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    })
}

fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    gradient(width, height).save(&path).unwrap();
    path
}

fn write_jpeg(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    image::DynamicImage::ImageRgba8(gradient(width, height))
        .into_rgb8()
        .save(&path)
        .unwrap();
    path
}

fn write_gif(dir: &TempDir, name: &str, frame_count: u32, width: u32, height: u32) -> PathBuf {
    let path = dir.path().join(name);
    let file = fs::File::create(&path).unwrap();
    let mut encoder = GifEncoder::new(file);
    let frames = (0..frame_count).map(|i| {
        let mut buffer = gradient(width, height);
        // Make each frame distinct.
        buffer.put_pixel(0, 0, Rgba([(i * 40) as u8, 0, 0, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
    });
    encoder.encode_frames(frames).unwrap();
    path
}

fn decoded_dimensions(path: &Path) -> (u32, u32) {
    let image = ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .decode()
        .unwrap();
    (image.width(), image.height())
}

fn run(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    options: &PipelineOptions,
) -> rescale::Result<()> {
    rescale::rescale_file(
        input,
        output,
        width,
        height,
        options,
        &ResourceLimits::unlimited(),
    )
}

#[test]
fn downscales_to_the_exact_target() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 128, 96);
    let output = dir.path().join("out.webp");

    run(&input, &output, 64, 48, &PipelineOptions::default()).unwrap();

    assert_eq!(decoded_dimensions(&output), (64, 48));
    let format = ImageReader::open(&output)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .format();
    assert_eq!(format, Some(ImageFormat::WebP));
}

#[test]
fn never_upscales_past_the_source() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 64, 48);
    let output = dir.path().join("out.webp");

    // Width request exceeds the source, height stays within bounds.
    run(&input, &output, 128, 40, &PipelineOptions::default()).unwrap();

    assert_eq!(decoded_dimensions(&output), (64, 40));
}

#[test]
fn animated_input_keeps_its_frame_count() {
    let dir = TempDir::new().unwrap();
    let input = write_gif(&dir, "in.gif", 3, 64, 64);
    let output = dir.path().join("out.webp");

    run(&input, &output, 32, 32, &PipelineOptions::default()).unwrap();

    let decoder = WebPDecoder::new(std::io::BufReader::new(fs::File::open(&output).unwrap()))
        .unwrap();
    assert!(decoder.has_animation());
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert_eq!(frame.buffer().dimensions(), (32, 32));
    }
}

#[test]
fn animated_input_to_gif_output() {
    let dir = TempDir::new().unwrap();
    let input = write_gif(&dir, "in.gif", 2, 40, 40);
    let output = dir.path().join("out.gif");

    let options = PipelineOptions {
        format: OutputFormat::Gif,
        ..PipelineOptions::default()
    };
    run(&input, &output, 20, 20, &options).unwrap();

    let decoder = image::codecs::gif::GifDecoder::new(std::io::BufReader::new(
        fs::File::open(&output).unwrap(),
    ))
    .unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 2);
}

#[test]
fn missing_input_fails_without_creating_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("does-not-exist.png");
    let output = dir.path().join("out.webp");

    let err = run(&input, &output, 32, 32, &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, RescaleError::Io(_)));
    assert!(!output.exists());
}

#[test]
fn zero_byte_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("empty.png");
    fs::write(&input, []).unwrap();
    let output = dir.path().join("out.webp");

    assert!(run(&input, &output, 32, 32, &PipelineOptions::default()).is_err());
    assert!(!output.exists());
}

#[test]
fn non_image_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.txt");
    fs::write(&input, b"this is not an image").unwrap();
    let output = dir.path().join("out.webp");

    assert!(run(&input, &output, 32, 32, &PipelineOptions::default()).is_err());
    assert!(!output.exists());
}

#[test]
fn png_output_is_decodable_regardless_of_input_format() {
    let dir = TempDir::new().unwrap();
    let input = write_jpeg(&dir, "in.jpg", 80, 60);
    let output = dir.path().join("out.png");

    let options = PipelineOptions {
        quality: 50,
        format: OutputFormat::Png,
        ..PipelineOptions::default()
    };
    run(&input, &output, 40, 30, &options).unwrap();

    let reader = ImageReader::open(&output)
        .unwrap()
        .with_guessed_format()
        .unwrap();
    assert_eq!(reader.format(), Some(ImageFormat::Png));
    let image = reader.decode().unwrap();
    assert_eq!((image.width(), image.height()), (40, 30));
}

#[test]
fn jpeg_output_drops_alpha_and_respects_quality() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 64, 64);
    let output = dir.path().join("out.jpg");

    let options = PipelineOptions {
        quality: 85,
        format: OutputFormat::Jpeg,
        ..PipelineOptions::default()
    };
    run(&input, &output, 32, 32, &options).unwrap();

    let reader = ImageReader::open(&output)
        .unwrap()
        .with_guessed_format()
        .unwrap();
    assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
}

#[test]
fn resizing_to_the_native_size_keeps_dimensions() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 64, 48);
    let output = dir.path().join("out.webp");

    run(&input, &output, 64, 48, &PipelineOptions::default()).unwrap();

    assert_eq!(decoded_dimensions(&output), (64, 48));
}

#[test]
fn zero_target_dimensions_are_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 64, 48);
    let output = dir.path().join("out.webp");

    let err = run(&input, &output, 0, 48, &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, RescaleError::Transform(_)));
    assert!(!output.exists());
}

#[test]
fn memory_limit_rejects_oversized_decodes() {
    let dir = TempDir::new().unwrap();
    let input = write_png(&dir, "in.png", 256, 256);
    let output = dir.path().join("out.webp");

    // 256x256 RGBA needs 256 KiB of pixel data; a 1 KiB budget cannot hold it.
    let result = rescale::rescale_file(
        &input,
        &output,
        64,
        64,
        &PipelineOptions::default(),
        &ResourceLimits::with_memory(1024),
    );
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn concurrent_calls_are_isolated() {
    let dir = TempDir::new().unwrap();
    let mut handles = Vec::new();
    for i in 0..4u32 {
        let input = write_png(&dir, &format!("in-{i}.png"), 96 + i, 64 + i);
        let output = dir.path().join(format!("out-{i}.webp"));
        handles.push(thread::spawn(move || {
            run(&input, &output, 48, 32, &PipelineOptions::default()).unwrap();
            decoded_dimensions(&output)
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (48, 32));
    }
}
