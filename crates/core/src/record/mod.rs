use std::path::{Path, PathBuf};

use crate::Result;

/// Output path for a compiled score: the input path with a `wav` extension.
pub fn output_path_for(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension("wav")
}

/// Writes mono 16-bit PCM samples to `path`.
pub fn write_wav(path: impl AsRef<Path>, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    tracing::debug!(
        path = %path.as_ref().display(),
        samples = samples.len(),
        sample_rate,
        "wrote wav file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_the_extension() {
        assert_eq!(output_path_for("songs/theme.thr"), PathBuf::from("songs/theme.wav"));
        assert_eq!(output_path_for("plain"), PathBuf::from("plain.wav"));
    }

    #[test]
    fn writes_mono_pcm16() {
        let path = std::env::temp_dir().join("throrgan_record_test.wav");
        let samples = [0_i16, i16::MAX, -i16::MAX, 1234];
        write_wav(&path, &samples, 22_050).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);

        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);

        std::fs::remove_file(&path).unwrap();
    }
}
