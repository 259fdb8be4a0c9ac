//! WAV encoding for 16-bit stereo PCM.

use crate::frame::Frame;
use std::io::{Cursor, Seek, Write};

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

pub fn write_wav<W: Write + Seek>(
    w: W,
    frames: &[Frame],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = hound::WavWriter::new(w, spec(sample_rate))?;
    for frame in frames {
        writer.write_sample(frame.left)?;
        writer.write_sample(frame.right)?;
    }
    writer.finalize()
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut buf = Cursor::new(Vec::new());
    write_wav(&mut buf, frames, sample_rate)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_samples_read_back() {
        let frames = [
            Frame { left: 1, right: -1 },
            Frame { left: 300, right: -300 },
        ];
        let bytes = frames_to_wav(&frames, 22_050).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22_050);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, [1, -1, 300, -300]);
    }
}
