use std::io::Write;

use log::warn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChimeError {
    #[cfg_attr(not(feature = "audio"), allow(dead_code))]
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("failed to write terminal bell: {0}")]
    Io(#[from] std::io::Error),
    #[error("no fallback tone available")]
    NoFallback,
}

pub trait ChimePlayer: Send {
    fn play_bell(&self) -> Result<(), ChimeError>;

    fn play_fallback(&self) -> Result<(), ChimeError> {
        Err(ChimeError::NoFallback)
    }
}

/// Plays the bell, dropping to the fallback tone and then to silence.
/// Failures are logged and never retried.
pub fn ring(player: &dyn ChimePlayer) {
    let Err(err) = player.play_bell() else {
        return;
    };
    warn!("bell playback failed: {err}");
    if let Err(err) = player.play_fallback() {
        warn!("fallback tone failed: {err}");
    }
}

pub struct TerminalBell;

impl ChimePlayer for TerminalBell {
    fn play_bell(&self) -> Result<(), ChimeError> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use self::audio::RodioChime;

#[cfg(feature = "audio")]
mod audio {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::{self, Sender};
    use std::thread;
    use std::time::Duration;

    use log::warn;
    use rodio::source::{SineWave, Source};
    use rodio::{Decoder, OutputStream, Sink};

    use super::{ChimeError, ChimePlayer};

    const FALLBACK_FREQUENCY_HZ: f32 = 1_000.0;
    const FALLBACK_DURATION: Duration = Duration::from_millis(300);
    const FALLBACK_GAIN: f32 = 0.06;

    enum ChimeCommand {
        Bell,
        Tone,
    }

    /// Plays a bell file on a dedicated audio thread. The output stream is
    /// not `Send`, so it never leaves that thread.
    pub struct RodioChime {
        tx: Sender<ChimeCommand>,
    }

    impl RodioChime {
        pub fn new(bell_file: Option<PathBuf>) -> Result<Self, ChimeError> {
            let (tx, rx) = mpsc::channel::<ChimeCommand>();
            thread::Builder::new()
                .name("chime".to_string())
                .spawn(move || {
                    let output = OutputStream::try_default();
                    let (_stream, handle) = match output {
                        Ok(output) => output,
                        Err(err) => {
                            warn!("audio output unavailable, chimes are silent: {err}");
                            while rx.recv().is_ok() {}
                            return;
                        }
                    };
                    while let Ok(command) = rx.recv() {
                        let sink = match Sink::try_new(&handle) {
                            Ok(sink) => sink,
                            Err(err) => {
                                warn!("could not open audio sink: {err}");
                                continue;
                            }
                        };
                        let bell = match command {
                            ChimeCommand::Bell => match load_bell(bell_file.as_deref()) {
                                Ok(source) => source,
                                Err(err) => {
                                    warn!("bell file unusable, using tone: {err}");
                                    None
                                }
                            },
                            ChimeCommand::Tone => None,
                        };
                        match bell {
                            Some(source) => sink.append(source),
                            None => sink.append(
                                SineWave::new(FALLBACK_FREQUENCY_HZ)
                                    .take_duration(FALLBACK_DURATION)
                                    .amplify(FALLBACK_GAIN),
                            ),
                        }
                        sink.sleep_until_end();
                    }
                })
                .map_err(|err| ChimeError::Output(err.to_string()))?;
            Ok(Self { tx })
        }

        fn send(&self, command: ChimeCommand) -> Result<(), ChimeError> {
            self.tx
                .send(command)
                .map_err(|_| ChimeError::Output("chime thread stopped".to_string()))
        }
    }

    // No configured file means the tone is the bell, not a failure.
    fn load_bell(path: Option<&Path>) -> Result<Option<Decoder<BufReader<File>>>, String> {
        let Some(path) = path else {
            return Ok(None);
        };
        let file = File::open(path).map_err(|err| format!("{}: {err}", path.display()))?;
        Decoder::new(BufReader::new(file))
            .map(Some)
            .map_err(|err| err.to_string())
    }

    impl ChimePlayer for RodioChime {
        fn play_bell(&self) -> Result<(), ChimeError> {
            self.send(ChimeCommand::Bell)
        }

        fn play_fallback(&self) -> Result<(), ChimeError> {
            self.send(ChimeCommand::Tone)
        }
    }

}


#[cfg(test)]
mod tests {
    use super::testing::CountingChime;
    use super::*;

    #[test]
    fn failed_bell_degrades_to_fallback_once() {
        let chime = CountingChime {
            fail_bell: true,
            ..CountingChime::default()
        };
        ring(&chime);
        assert_eq!(chime.bells(), 1);
        assert_eq!(chime.fallbacks(), 1);
    }

    #[test]
    fn successful_bell_skips_fallback() {
        let chime = CountingChime::default();
        ring(&chime);
        assert_eq!(chime.bells(), 1);
        assert_eq!(chime.fallbacks(), 0);
    }

    #[test]
    fn default_fallback_reports_unavailable() {
        assert!(matches!(
            TerminalBell.play_fallback(),
            Err(ChimeError::NoFallback)
        ));
    }
}
