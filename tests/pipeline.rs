//! End-to-end tests for the spectrogram pipeline.

use birdcall::{AudioClip, Error, SpectrogramGenerator, SpectrogramOverrides, SpectrogramParameters};
use std::fs;
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("birdcall-it-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn sine(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f32> {
    let n = (seconds * sample_rate as f64) as usize;
    (0..n)
        .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
        .collect()
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn three_second_tone_end_to_end() {
    let dir = scratch_dir("tone");
    let clip = AudioClip::from_samples(sine(440.0, 22050, 3.0), 22050).unwrap();
    let out = dir.join("tone.png");

    let gen = SpectrogramGenerator::default();
    let result = gen
        .generate_from_clip(&clip, &out, &SpectrogramOverrides::new())
        .unwrap();

    assert!((result.duration_seconds - 3.0).abs() <= 0.05);
    assert_eq!(result.sample_rate, 22050);
    let params = gen.default_params();
    let expected_h = params.figure_size.1 * params.dpi as f64;
    assert!((result.image_height as f64 - expected_h).abs() <= 1.0);
    let expected_w = params.figure_size.0 * params.dpi as f64;
    assert!((result.image_width as f64 - expected_w).abs() <= 1.0);

    let img = image::open(&out).unwrap().to_rgb8();
    assert_eq!((img.width(), img.height()), (result.image_width, result.image_height));
    let first = *img.get_pixel(0, 0);
    assert!(
        img.pixels().any(|p| *p != first),
        "spectrogram image is a single colour"
    );
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let dir = scratch_dir("determinism");
    let wav = dir.join("call.wav");
    write_wav(&wav, &sine(2500.0, 44100, 1.5), 44100);

    let gen = SpectrogramGenerator::default();
    let overrides = SpectrogramOverrides::new().n_mels(64);
    let a = gen.generate(&wav, &dir.join("a.png"), &overrides).unwrap();
    let b = gen.generate(&wav, &dir.join("b.png"), &overrides).unwrap();

    assert_eq!(a, b);
    assert_eq!(
        fs::read(dir.join("a.png")).unwrap(),
        fs::read(dir.join("b.png")).unwrap()
    );
}

#[test]
fn overrides_round_trip_through_metadata() {
    let dir = scratch_dir("roundtrip");
    let clip = AudioClip::from_samples(sine(1000.0, 22050, 1.0), 22050).unwrap();
    let overrides = SpectrogramOverrides::new()
        .n_fft(1024)
        .hop_length(256)
        .figure_size(5.0, 2.0);

    let gen = SpectrogramGenerator::default();
    let result = gen
        .generate_from_clip(&clip, &dir.join("spec.png"), &overrides)
        .unwrap();

    let parsed: SpectrogramParameters = serde_json::from_str(&result.spectrogram_params).unwrap();
    let defaults = SpectrogramParameters::default();
    assert_eq!(parsed.n_fft, 1024);
    assert_eq!(parsed.hop_length, 256);
    assert_eq!(parsed.figure_size, (5.0, 2.0));
    assert_eq!(parsed.n_mels, defaults.n_mels);
    assert_eq!(parsed.fmin, defaults.fmin);
    assert_eq!(parsed.fmax, defaults.fmax);
    assert_eq!(parsed.dpi, defaults.dpi);
    assert_eq!(parsed.sample_rate, 22050);
    assert_eq!(parsed, gen.effective_params(&overrides).unwrap());
    assert_eq!((result.image_width, result.image_height), (500, 200));
}

#[test]
fn nested_output_directories_are_created() {
    let dir = scratch_dir("nested");
    let out = dir.join("one/two/three/spec.png");
    let clip = AudioClip::from_samples(sine(440.0, 22050, 0.5), 22050).unwrap();

    SpectrogramGenerator::default()
        .generate_from_clip(&clip, &out, &SpectrogramOverrides::new())
        .unwrap();

    let entries: Vec<_> = fs::read_dir(out.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("spec.png")]);
}

#[test]
fn clip_shorter_than_window_is_rejected() {
    let dir = scratch_dir("short");
    let out = dir.join("spec.png");
    let clip = AudioClip::from_samples(vec![0.25; 1000], 22050).unwrap();

    let err = SpectrogramGenerator::default()
        .generate_from_clip(&clip, &out, &SpectrogramOverrides::new())
        .unwrap_err();
    assert!(matches!(err, Error::SpectrogramCompute(_)));
    assert!(!out.exists());
}

#[test]
fn zero_max_duration_is_a_load_error() {
    let dir = scratch_dir("zero");
    let wav = dir.join("call.wav");
    write_wav(&wav, &sine(440.0, 22050, 1.0), 22050);

    let err = SpectrogramGenerator::default()
        .load_audio(&wav, None, Some(0.0))
        .unwrap_err();
    assert!(matches!(err, Error::AudioLoad { .. }));
}

#[test]
fn invalid_override_is_a_config_error() {
    let dir = scratch_dir("config");
    let clip = AudioClip::from_samples(sine(440.0, 22050, 1.0), 22050).unwrap();
    let err = SpectrogramGenerator::default()
        .generate_from_clip(
            &clip,
            &dir.join("spec.png"),
            &SpectrogramOverrides::new().fmax(20000.0),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn parallel_invocations_do_not_interfere() {
    let dir = scratch_dir("parallel");
    let gen = SpectrogramGenerator::default();
    let clip = AudioClip::from_samples(sine(3000.0, 22050, 1.0), 22050).unwrap();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let gen = &gen;
                let clip = &clip;
                let out = dir.join(format!("spec{i}.png"));
                s.spawn(move || gen.generate_from_clip(clip, &out, &SpectrogramOverrides::new()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    let first = fs::read(dir.join("spec0.png")).unwrap();
    for i in 1..4 {
        assert_eq!(fs::read(dir.join(format!("spec{i}.png"))).unwrap(), first);
    }
}
