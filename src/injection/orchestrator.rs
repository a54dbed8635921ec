//! Corpus-wide noise injection
//!
//! For every speech file a random stretch covering `percentage` percent of
//! its duration is mixed with the next stretch of the noise reservoir for the
//! file's sampling rate. The reservoir cursor is shared by all files at that
//! rate, so consecutive files hear consecutive noise.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::reservoir::{NoiseWindow, ReservoirRegistry};
use crate::config::InjectionConfig;
use crate::corpus::{self, CorpusEntry};
use crate::engine::segment::TimeSegment;
use crate::error::{AugmentError, Result};
use crate::pipeline::{Audio, MixOptions, WriteOptions};

/// What happened to one speech file
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub speaker: String,
    pub source: PathBuf,
    /// Written audio file; `None` when the file was skipped
    pub output: Option<PathBuf>,
    /// Reservoir windows mixed in, in order
    pub windows: Vec<NoiseWindow>,
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionReport {
    /// Files written
    pub processed: usize,
    /// Files with nothing to inject
    pub skipped: usize,
    /// Files that failed and were left out
    pub failed: usize,
    pub files: Vec<FileReport>,
}

impl InjectionReport {
    pub fn written(&self) -> Vec<PathBuf> {
        self.files.iter().filter_map(|f| f.output.clone()).collect()
    }

    fn record(&mut self, entry: &CorpusEntry, outcome: Result<FileReport>) -> Result<()> {
        match outcome {
            Ok(file) => {
                if file.output.is_some() {
                    self.processed += 1;
                } else {
                    self.skipped += 1;
                }
                self.files.push(file);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Speaker {}: failed to process {}: {}",
                    entry.speaker,
                    entry.path.display(),
                    e
                );
                self.failed += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Runs noise injection over a speech corpus
pub struct NoiseInjector {
    config: InjectionConfig,
    registry: ReservoirRegistry,
    write_options: WriteOptions,
    mix_options: MixOptions,
}

impl NoiseInjector {
    /// Validate `config` and index the noise corpus
    pub fn new(config: InjectionConfig) -> Result<Self> {
        config.validate()?;
        let registry = ReservoirRegistry::new(&config.noise_path)?;
        Ok(Self {
            write_options: config.write_options(),
            mix_options: MixOptions::default(),
            config,
            registry,
        })
    }

    pub fn registry(&self) -> &ReservoirRegistry {
        &self.registry
    }

    fn rng(&self, worker: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
            None => StdRng::from_os_rng(),
        }
    }

    /// Process every speech file
    ///
    /// Per-file failures are logged and counted. Run-level failures and
    /// cancellation stop the run.
    pub fn run(&self, cancel: &AtomicBool) -> Result<InjectionReport> {
        let entries = corpus::speech_files(&self.config.speech_path)?;
        info!(
            "Injecting {}% noise into {} files from {} ({} worker(s))",
            self.config.percentage,
            entries.len(),
            self.config.speech_path.display(),
            self.config.workers
        );

        let report = if self.config.workers > 1 {
            self.run_parallel(entries, cancel)?
        } else {
            self.run_sequential(entries, cancel)?
        };

        if cancel.load(Ordering::SeqCst) {
            info!(
                "Injection cancelled after {} written, {} skipped, {} failed",
                report.processed, report.skipped, report.failed
            );
            return Err(AugmentError::Cancelled);
        }

        info!(
            "Injection finished: {} written, {} skipped, {} failed",
            report.processed, report.skipped, report.failed
        );
        Ok(report)
    }

    fn run_sequential(&self, entries: Vec<CorpusEntry>, cancel: &AtomicBool) -> Result<InjectionReport> {
        let mut rng = self.rng(0);
        let mut report = InjectionReport::default();
        for entry in &entries {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let outcome = self.inject_file(entry, &mut rng);
            report.record(entry, outcome)?;
        }
        Ok(report)
    }

    fn run_parallel(&self, entries: Vec<CorpusEntry>, cancel: &AtomicBool) -> Result<InjectionReport> {
        let workers = self.config.workers;
        let (job_tx, job_rx) = bounded::<CorpusEntry>(workers * 2);
        let (done_tx, done_rx) = unbounded::<(CorpusEntry, Result<FileReport>)>();
        let abort = AtomicBool::new(false);
        let mut fatal = None;
        let stopped = || cancel.load(Ordering::SeqCst) || abort.load(Ordering::SeqCst);

        let mut report = InjectionReport::default();
        thread::scope(|scope| {
            scope.spawn(move || {
                for entry in entries {
                    if stopped() || job_tx.send(entry).is_err() {
                        break;
                    }
                }
            });

            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let mut rng = self.rng(worker);
                scope.spawn(move || {
                    for entry in job_rx {
                        if stopped() {
                            break;
                        }
                        let outcome = self.inject_file(&entry, &mut rng);
                        if done_tx.send((entry, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(done_tx);

            for (entry, outcome) in done_rx {
                if let Err(e) = report.record(&entry, outcome) {
                    abort.store(true, Ordering::SeqCst);
                    fatal.get_or_insert(e);
                }
            }
        });

        // Parallel completion order is arbitrary
        report.files.sort_by(|a, b| (&a.speaker, &a.source).cmp(&(&b.speaker, &b.source)));

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Mix one speech file with its share of noise and write it
    fn inject_file(&self, entry: &CorpusEntry, rng: &mut StdRng) -> Result<FileReport> {
        let speech = Audio::load(&entry.path)?;
        let rate = speech.sampling_rate();
        let total = speech.len();

        let noise_seconds = (speech.duration() / 100.0 * self.config.percentage).min(speech.duration());
        let noise_samples = ((noise_seconds * rate as f64).round() as usize).min(total);
        let mut report = FileReport {
            speaker: entry.speaker.clone(),
            source: entry.path.clone(),
            output: None,
            windows: Vec::new(),
        };
        if noise_samples == 0 {
            debug!(
                "Speaker {}: nothing to inject into {}",
                entry.speaker,
                entry.path.display()
            );
            return Ok(report);
        }

        // Mixing normalises the speech; reject silence before claiming noise
        let peak = speech.buffer().peak();
        if peak == 0.0 || !peak.is_finite() {
            return Err(AugmentError::SilentSignal);
        }

        let latest = speech.duration() - noise_seconds;
        let start_at = rng.random_range(0.0..=latest.max(0.0));
        let mut position = ((start_at * rate as f64).round() as usize).min(total - noise_samples);

        let reservoir = self.registry.get_or_build(rate)?;
        let windows = reservoir.reserve(noise_samples);
        debug!(
            "Speaker {}: {} gets {} noise samples at {} from {:?}",
            entry.speaker,
            entry.path.display(),
            noise_samples,
            position,
            windows
        );

        let mut mixed = speech;
        for window in &windows {
            let mine = TimeSegment::new(
                position as f64 / rate as f64,
                (position + window.len()) as f64 / rate as f64,
            )?;
            let theirs = window.to_segment(rate)?;
            mixed = mixed.mix(reservoir.audio(), Some(&[mine, theirs]), &self.mix_options)?;
            position += window.len();
        }

        let out_dir = self.config.save_path.join(&entry.speaker);
        let written = mixed.write(&out_dir, &self.write_options)?;
        report.output = Some(written.audio);
        report.windows = windows;
        Ok(report)
    }
}

/// Validate `config`, then inject noise into its whole corpus
pub fn inject_corpus(config: &InjectionConfig, cancel: Arc<AtomicBool>) -> Result<InjectionReport> {
    NoiseInjector::new(config.clone())?.run(&cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{generate_test_tone, write_wav, BitDepth};
    use crate::pipeline::{Recipe, StepKind};
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const RATE: u32 = 1000;

    struct Corpus {
        _dir: TempDir,
        config: InjectionConfig,
    }

    fn write_tone(path: &Path, freq: f32, secs: f32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_wav(path, &generate_test_tone(freq, secs, RATE), RATE, BitDepth::Float32).unwrap();
    }

    /// `speech` files per speaker of the given durations plus one noise file
    fn corpus(speech: &[(&str, &str, f32)], noise_secs: f32) -> Corpus {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for (speaker, name, secs) in speech {
            write_tone(&root.join("speech").join(speaker).join(name), 50.0, *secs);
        }
        write_tone(&root.join("noise").join("hum.wav"), 70.0, noise_secs);

        let mut config = InjectionConfig::new(
            &root.join("speech"),
            &root.join("noise"),
            &root.join("save"),
        );
        config.seed = Some(42);
        Corpus { _dir: dir, config }
    }

    #[test]
    fn test_consecutive_files_draw_consecutive_noise() {
        let c = corpus(&[("p1", "a.wav", 10.0), ("p1", "b.wav", 10.0)], 5.0);
        let injector = NoiseInjector::new(c.config.clone()).unwrap();
        let report = injector.run(&AtomicBool::new(false)).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.files[0].windows, vec![NoiseWindow { start: 0, end: 2000 }]);
        assert_eq!(report.files[1].windows, vec![NoiseWindow { start: 2000, end: 4000 }]);
        let reservoir = injector.registry().get_or_build(RATE).unwrap();
        assert_eq!(reservoir.cursor(), 4000);
    }

    #[test]
    fn test_request_wraps_reservoir() {
        let mut c = corpus(&[("p1", "a.wav", 10.0)], 3.0);
        c.config.percentage = 20.0;
        let injector = NoiseInjector::new(c.config.clone()).unwrap();
        injector.registry().get_or_build(RATE).unwrap().set_cursor(2000);

        let report = injector.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(
            report.files[0].windows,
            vec![
                NoiseWindow { start: 2000, end: 3000 },
                NoiseWindow { start: 0, end: 1000 },
            ]
        );
        assert_eq!(injector.registry().get_or_build(RATE).unwrap().cursor(), 1000);

        let output = report.files[0].output.clone().unwrap();
        assert_eq!(output.file_name().unwrap(), "a|Mix|Mix.wav");
        let recipe = fs::read_to_string(output.with_file_name("a|Mix|Mix.json")).unwrap();
        let recipe = Recipe::from_json(&recipe).unwrap();
        assert_eq!(recipe.kinds(), vec![StepKind::Mix, StepKind::Mix]);
    }

    #[test]
    fn test_invalid_percentage_touches_nothing() {
        let mut c = corpus(&[("p1", "a.wav", 1.0)], 1.0);
        c.config.percentage = 150.0;
        let err = inject_corpus(&c.config, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(matches!(err, AugmentError::InvalidPercentage { .. }));
        assert!(!c.config.save_path.exists());
    }

    #[test]
    fn test_zero_percentage_skips_files() {
        let mut c = corpus(&[("p1", "a.wav", 1.0)], 1.0);
        c.config.percentage = 0.0;
        let report = inject_corpus(&c.config, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 0);
        assert!(report.written().is_empty());
    }

    #[test]
    fn test_full_percentage_covers_file() {
        let mut c = corpus(&[("p1", "a.wav", 2.0)], 5.0);
        c.config.percentage = 100.0;
        let report = inject_corpus(&c.config, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(report.files[0].windows, vec![NoiseWindow { start: 0, end: 2000 }]);
    }

    #[test]
    fn test_undecodable_file_is_counted_and_skipped() {
        let c = corpus(&[("p1", "a.wav", 1.0), ("p2", "c.wav", 1.0)], 2.0);
        fs::write(c.config.speech_path.join("p1").join("broken.wav"), b"junk").unwrap();

        let report = inject_corpus(&c.config, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 2);
        assert!(c.config.save_path.join("p2").join("c|Mix.wav").exists());
    }

    #[test]
    fn test_silent_file_claims_no_noise() {
        let c = corpus(&[("p1", "a.wav", 10.0), ("p1", "b.wav", 10.0)], 5.0);
        let silent = c.config.speech_path.join("p1").join("a.wav");
        write_wav(&silent, &vec![0.0; 10 * RATE as usize], RATE, BitDepth::Float32).unwrap();

        let injector = NoiseInjector::new(c.config.clone()).unwrap();
        let report = injector.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);

        let written: Vec<&FileReport> = report.files.iter().filter(|f| f.output.is_some()).collect();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].windows, vec![NoiseWindow { start: 0, end: 2000 }]);
        assert_eq!(injector.registry().get_or_build(RATE).unwrap().cursor(), 2000);
    }

    #[test]
    fn test_parallel_run_uses_disjoint_noise() {
        let files: Vec<(&str, String)> = (0..6).map(|i| ("p1", format!("f{}.wav", i))).collect();
        let speech: Vec<(&str, &str, f32)> =
            files.iter().map(|(s, n)| (*s, n.as_str(), 5.0)).collect();
        let mut c = corpus(&speech, 60.0);
        c.config.workers = 3;

        let report = inject_corpus(&c.config, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(report.processed, 6);

        let mut starts: Vec<usize> = report.files.iter().map(|f| f.windows[0].start).collect();
        starts.sort_unstable();
        assert_eq!(starts, vec![0, 1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn test_cancelled_run() {
        let c = corpus(&[("p1", "a.wav", 1.0)], 1.0);
        let cancel = Arc::new(AtomicBool::new(true));
        let err = inject_corpus(&c.config, cancel).unwrap_err();
        assert!(matches!(err, AugmentError::Cancelled));
        assert!(!c.config.save_path.join("p1").exists());
    }
}
