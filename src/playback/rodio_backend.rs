use std::io::Cursor;
use std::sync::Arc;

use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use super::{PlaybackBackend, PlaybackError};

/// Default output device; cards created from it share its mixer.
pub struct AudioOutput {
    stream: OutputStream,
}

impl AudioOutput {
    pub fn open_default() -> Result<Self, PlaybackError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|err| PlaybackError::Output(err.to_string()))?;
        Ok(Self { stream })
    }

    /// Backend for one card holding the encoded asset bytes.
    pub fn backend(&self, bytes: Arc<[u8]>, hint: Option<&str>) -> RodioBackend {
        RodioBackend {
            mixer: self.stream.mixer().clone(),
            bytes,
            hint: hint.map(str::to_string),
            sink: None,
        }
    }
}

/// Plays encoded bytes through a dedicated sink.
///
/// The sink is built lazily on first start and dropped on rewind, so the
/// next start decodes from the beginning.
pub struct RodioBackend {
    mixer: Mixer,
    bytes: Arc<[u8]>,
    hint: Option<String>,
    sink: Option<Sink>,
}

impl RodioBackend {
    fn decoder(&self) -> Result<Decoder<Cursor<Arc<[u8]>>>, PlaybackError> {
        let mut builder = Decoder::builder()
            .with_data(Cursor::new(self.bytes.clone()))
            .with_byte_len(self.bytes.len() as u64)
            .with_seekable(true);
        if let Some(hint) = self.hint.as_deref() {
            builder = builder.with_hint(hint);
        }
        builder
            .build()
            .map_err(|err| PlaybackError::Decode(err.to_string()))
    }
}

impl PlaybackBackend for RodioBackend {
    fn start(&mut self) -> Result<(), PlaybackError> {
        if let Some(sink) = &self.sink
            && !sink.empty()
        {
            sink.play();
            return Ok(());
        }
        let source = self.decoder()?;
        let sink = Sink::connect_new(&self.mixer);
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn rewind(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().is_some_and(Sink::empty)
    }
}
