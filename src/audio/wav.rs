//! Offline rendering of the mixer to WAV.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use super::backend::AudioError;
use super::mixer::{self, SharedMixer};
use crate::params::audio_constants::{BLOCK_SIZE, MIXER_CHANNELS};

/// WAV writer used for session renders
pub type WavFileWriter = hound::WavWriter<BufWriter<File>>;

/// Create a 32-bit float stereo WAV at `path`
pub fn create_writer(
    path: impl AsRef<Path>,
    sample_rate_hz: u32,
) -> Result<WavFileWriter, AudioError> {
    let spec = hound::WavSpec {
        channels: MIXER_CHANNELS,
        sample_rate: sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    Ok(hound::WavWriter::create(path, spec)?)
}

/// Pull `frames` frames from the mixer and append them to `writer`
pub fn render_frames<W: Write + Seek>(
    mixer: &SharedMixer,
    writer: &mut hound::WavWriter<W>,
    frames: usize,
) -> Result<(), AudioError> {
    let mut remaining = frames;
    let mut block = vec![0.0f32; BLOCK_SIZE * MIXER_CHANNELS as usize];
    while remaining > 0 {
        let count = remaining.min(BLOCK_SIZE);
        let out = &mut block[..count * MIXER_CHANNELS as usize];
        // Lock per block so a live reader is never starved
        mixer::lock(mixer).render(out, MIXER_CHANNELS as usize);
        for &sample in out.iter() {
            writer.write_sample(sample)?;
        }
        remaining -= count;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mixer::Mixer;
    use std::io::Cursor;

    #[test]
    fn test_render_frames_writes_interleaved_stereo() {
        let mixer = Mixer::new(8_000, 0.5).shared();
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            render_frames(&mixer, &mut writer, 2_500).unwrap();
            writer.finalize().unwrap();
        }

        cursor.set_position(0);
        let reader = hound::WavReader::new(cursor).unwrap();
        assert_eq!(reader.len(), 5_000);
        assert_eq!(mixer::lock(&mixer).now(), 2_500);
    }
}
