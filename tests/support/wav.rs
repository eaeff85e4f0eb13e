use std::path::Path;

/// Write a silent mono 16-bit WAV of roughly `seconds` length.
pub fn write_silent_wav(path: &Path, sample_rate: u32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    let frames = (sample_rate as f32 * seconds) as usize;
    for _ in 0..frames {
        writer.write_sample(0i16).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}
