//! Interactive menu
//!
//! A numbered menu read line by line from stdin. Ctrl+C stops the alarm and
//! exits like choosing "Exit".

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::{alarm_callback, build_selector, describe_interval, open_audio};
use crate::alarm::{
    parse_interval, AlarmClock, AlarmError, FireCallback, StartOutcome, StopOutcome,
};
use crate::notifications::{self, Notifier};
use crate::settings::Settings;
use crate::sound::{AlertSoundSelector, SoundSource, StopSoundOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Start,
    Stop,
    SetSound,
    ResetSound,
    StopSound,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Start),
            "2" => Some(MenuChoice::Stop),
            "3" => Some(MenuChoice::SetSound),
            "4" => Some(MenuChoice::ResetSound),
            "5" => Some(MenuChoice::StopSound),
            "6" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

const MENU: &str = "
1. Start timer
2. Stop timer
3. Set custom sound
4. Reset to default sound
5. Stop current sound (timer continues)
6. Exit";

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

pub struct Menu<W: Write> {
    clock: AlarmClock,
    selector: Arc<AlertSoundSelector>,
    on_fire: FireCallback,
    settings: Settings,
    settings_path: Option<PathBuf>,
    out: W,
}

impl<W: Write> Menu<W> {
    pub fn new(
        clock: AlarmClock,
        selector: Arc<AlertSoundSelector>,
        on_fire: FireCallback,
        settings: Settings,
        out: W,
    ) -> Self {
        Self {
            clock,
            selector,
            on_fire,
            settings,
            settings_path: None,
            out,
        }
    }

    /// Save sound changes to this settings file
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run until Exit, end of input or `shutdown` resolves
    pub async fn run<R, S>(&mut self, input: R, shutdown: S) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = input.lines();
        let shutdown = std::pin::pin!(shutdown);
        let mut shutdown: Pin<&mut S> = shutdown;

        writeln!(self.out, "=== Chimer Interval Alarm ===")?;
        match self.selector.active_source() {
            SoundSource::Custom(path) => writeln!(self.out, "(Using sound: {})", path.display())?,
            SoundSource::Default => writeln!(self.out, "(Using default sound)")?,
        }

        loop {
            writeln!(self.out, "{}", MENU)?;
            let line = match self.prompt("\nEnter your choice (1-6): ", &mut lines, &mut shutdown).await? {
                Input::Line(line) => line,
                Input::Eof => break,
                Input::Interrupted => {
                    writeln!(self.out, "\nProgram interrupted.")?;
                    break;
                }
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Start) => {
                    let text = match self
                        .prompt("Enter interval between alarms (in minutes): ", &mut lines, &mut shutdown)
                        .await?
                    {
                        Input::Line(text) => text,
                        Input::Eof => break,
                        Input::Interrupted => {
                            writeln!(self.out, "\nProgram interrupted.")?;
                            break;
                        }
                    };
                    self.start(&text)?;
                }
                Some(MenuChoice::Stop) => self.stop().await?,
                Some(MenuChoice::SetSound) => {
                    let path = match self
                        .prompt("Enter path to sound file (.wav, .mp3, .ogg): ", &mut lines, &mut shutdown)
                        .await?
                    {
                        Input::Line(path) => path,
                        Input::Eof => break,
                        Input::Interrupted => {
                            writeln!(self.out, "\nProgram interrupted.")?;
                            break;
                        }
                    };
                    self.set_sound(path.trim())?;
                }
                Some(MenuChoice::ResetSound) => self.reset_sound()?,
                Some(MenuChoice::StopSound) => self.stop_sound()?,
                Some(MenuChoice::Exit) => {
                    writeln!(self.out, "Exiting program.")?;
                    break;
                }
                None => writeln!(self.out, "Invalid choice. Please enter a number between 1 and 6.")?,
            }
        }

        self.shutdown().await
    }

    async fn prompt<R, S>(
        &mut self,
        text: &str,
        lines: &mut Lines<R>,
        shutdown: &mut Pin<&mut S>,
    ) -> anyhow::Result<Input>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        write!(self.out, "{}", text)?;
        self.out.flush()?;

        tokio::select! {
            _ = shutdown.as_mut() => Ok(Input::Interrupted),
            line = lines.next_line() => Ok(match line? {
                Some(line) => Input::Line(line),
                None => Input::Eof,
            }),
        }
    }

    fn start(&mut self, text: &str) -> anyhow::Result<()> {
        let seconds = match parse_interval(text) {
            Ok(seconds) => seconds,
            Err(e) => {
                tracing::debug!("[Menu] {}", e);
                writeln!(self.out, "Please enter a valid number for the interval.")?;
                return Ok(());
            }
        };

        let on_fire = self.on_fire.clone();
        let outcome = match self.clock.start(seconds, move |message| on_fire(message)) {
            Ok(outcome) => outcome,
            Err(AlarmError::InvalidInterval(value)) => {
                tracing::debug!("[Menu] Clock rejected interval {}", value);
                writeln!(self.out, "Please enter a valid number for the interval.")?;
                return Ok(());
            }
        };
        match outcome {
            StartOutcome::Started => {
                writeln!(
                    self.out,
                    "Timer started with interval: {}",
                    describe_interval(seconds)
                )?;
                writeln!(self.out, "Press Ctrl+C to stop the timer")?;
            }
            StartOutcome::AlreadyRunning => {
                let every = self
                    .clock
                    .interval()
                    .map(|interval| describe_interval(interval.as_secs_f64()))
                    .unwrap_or_default();
                writeln!(
                    self.out,
                    "Timer is already running (every {}, {} alarm(s) so far). Stop it first.",
                    every,
                    self.clock.fire_count()
                )?;
            }
        }
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        match self.clock.stop().await {
            StopOutcome::Stopped { fires } => {
                writeln!(self.out, "Timer stopped after {} alarm(s).", fires)?
            }
            StopOutcome::NotRunning => writeln!(self.out, "No timer is currently running.")?,
        }
        Ok(())
    }

    fn set_sound(&mut self, path: &str) -> anyhow::Result<()> {
        if path.is_empty() {
            writeln!(self.out, "No path entered. Keeping the current sound.")?;
            return Ok(());
        }
        match self.selector.set_custom_sound(path) {
            Ok(_) => {
                writeln!(self.out, "Sound set to: {}", path)?;
                self.settings.custom_sound = Some(PathBuf::from(path));
                self.settings.use_custom_sound = true;
                self.save_settings();
            }
            Err(e) => {
                writeln!(self.out, "Error setting sound: {}", e)?;
                writeln!(self.out, "Keeping the current sound.")?;
            }
        }
        Ok(())
    }

    fn reset_sound(&mut self) -> anyhow::Result<()> {
        self.selector.reset_to_default();
        self.settings.use_custom_sound = false;
        self.save_settings();
        writeln!(self.out, "Reset to default sound")?;
        if let Some(path) = self.selector.custom_sound() {
            writeln!(self.out, "({} is remembered; choose 3 to use it again)", path.display())?;
        }
        Ok(())
    }

    fn stop_sound(&mut self) -> anyhow::Result<()> {
        match self.selector.stop_current() {
            Ok(StopSoundOutcome::Stopped) => writeln!(self.out, "Current sound stopped.")?,
            Ok(StopSoundOutcome::NothingPlaying) if !self.clock.is_running() => {
                writeln!(self.out, "No timer is running, so no sound to stop.")?
            }
            Ok(StopSoundOutcome::NothingPlaying) => {
                writeln!(self.out, "No sound is currently playing.")?
            }
            Err(e) => writeln!(self.out, "Error stopping sound: {}", e)?,
        }
        Ok(())
    }

    fn save_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.save_to(path) {
            tracing::warn!("[Menu] Failed to save settings: {:#}", e);
        }
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        if let StopOutcome::Stopped { fires } = self.clock.stop().await {
            writeln!(self.out, "Timer stopped after {} alarm(s).", fires)?;
        }
        if let Err(e) = self.selector.stop_current() {
            tracing::warn!("[Menu] {}", e);
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Run the interactive menu on stdin and stdout
pub async fn run(settings: Settings, system_audio: bool) -> anyhow::Result<()> {
    let session = open_audio(&settings, system_audio)?;
    let selector = build_selector(&session, &settings);
    let notifier: Arc<dyn Notifier> = Arc::from(notifications::detect(settings.show_notifications));
    let clock = AlarmClock::new(selector.clone()).with_grace_period(settings.stop_grace());

    let mut menu = Menu::new(
        clock,
        selector,
        alarm_callback(notifier),
        settings,
        std::io::stdout(),
    );
    if let Some(path) = Settings::settings_path() {
        menu = menu.persist_to(path);
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("[Menu] Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    menu.run(tokio::io::BufReader::new(tokio::io::stdin()), ctrl_c)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::testing::RecordingBackend;
    use crate::sound::SourceKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    struct Fixture {
        backend: Arc<RecordingBackend>,
        selector: Arc<AlertSoundSelector>,
        fired: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let backend = RecordingBackend::new();
            let selector = Arc::new(AlertSoundSelector::new(backend.clone()));
            Self {
                backend,
                selector,
                fired: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn menu(&self) -> Menu<Vec<u8>> {
            let fired = self.fired.clone();
            let on_fire: FireCallback = Arc::new(move |msg: &str| {
                fired.lock().unwrap().push(msg.to_string());
                Ok(())
            });
            Menu::new(
                AlarmClock::new(self.selector.clone()),
                self.selector.clone(),
                on_fire,
                Settings::default(),
                Vec::new(),
            )
        }
    }

    async fn run_script(menu: &mut Menu<Vec<u8>>, script: &str) {
        menu.run(script.as_bytes(), std::future::pending::<()>())
            .await
            .unwrap();
    }

    fn output(menu: Menu<Vec<u8>>) -> String {
        String::from_utf8(menu.into_output()).unwrap()
    }

    #[test]
    fn test_menu_choice_parse() {
        assert_eq!(MenuChoice::parse("1"), Some(MenuChoice::Start));
        assert_eq!(MenuChoice::parse(" 5 \n"), Some(MenuChoice::StopSound));
        assert_eq!(MenuChoice::parse("6"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::parse("7"), None);
        assert_eq!(MenuChoice::parse("start"), None);
    }

    #[tokio::test]
    async fn test_invalid_choice_and_exit() {
        let fx = Fixture::new();
        let mut menu = fx.menu();
        run_script(&mut menu, "9\n6\n").await;

        let out = output(menu);
        assert!(out.starts_with("=== Chimer Interval Alarm ==="));
        assert!(out.contains("(Using default sound)"));
        assert!(out.contains("Invalid choice. Please enter a number between 1 and 6."));
        assert!(out.contains("Exiting program."));
    }

    #[tokio::test]
    async fn test_sound_choices() {
        let fx = Fixture::new();
        fx.backend.reject("/bad.mp3");
        let mut menu = fx.menu();
        run_script(&mut menu, "3\n/bad.mp3\n3\n/good.wav\n5\n4\n6\n").await;

        let out = output(menu);
        assert!(out.contains("Error setting sound: Could not load sound '/bad.mp3'"));
        assert!(out.contains("Keeping the current sound."));
        assert!(out.contains("Sound set to: /good.wav"));
        assert!(out.contains("No timer is running, so no sound to stop."));
        assert!(out.contains("Reset to default sound"));
        assert!(out.contains("(/good.wav is remembered; choose 3 to use it again)"));

        assert_eq!(fx.selector.active_source(), SoundSource::Default);
        assert_eq!(fx.selector.custom_sound(), Some(PathBuf::from("/good.wav")));
    }

    #[tokio::test]
    async fn test_sound_choice_persists_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let fx = Fixture::new();
        let mut menu = fx.menu().persist_to(path.clone());

        run_script(&mut menu, "3\n/good.wav\n6\n").await;
        let saved = Settings::load_from(&path).unwrap();
        assert_eq!(saved.custom_sound, Some(PathBuf::from("/good.wav")));
        assert!(saved.use_custom_sound);

        run_script(&mut menu, "4\n6\n").await;
        let saved = Settings::load_from(&path).unwrap();
        assert!(!saved.use_custom_sound);
        assert_eq!(saved.custom_sound, Some(PathBuf::from("/good.wav")));
    }

    #[tokio::test]
    async fn test_bad_interval_and_stop_without_timer() {
        let fx = Fixture::new();
        let mut menu = fx.menu();
        run_script(&mut menu, "1\nsoon\n1\n-3\n2\n6\n").await;

        let out = output(menu);
        assert_eq!(
            out.matches("Please enter a valid number for the interval.").count(),
            2
        );
        assert!(out.contains("No timer is currently running."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_interval_keeps_running_timer() {
        let fx = Fixture::new();
        let mut menu = fx.menu();
        run_script(&mut menu, "1\n1\n1\n1e300\n1\n1e-12\n5\n6\n").await;

        let out = output(menu);
        assert!(out.contains("Timer started with interval: 1 minute"));
        assert_eq!(
            out.matches("Please enter a valid number for the interval.").count(),
            2
        );
        assert!(out.contains("No sound is currently playing."));
        assert!(out.contains("Exiting program."));
        assert!(out.contains("Timer stopped after 0 alarm(s)."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_between_commands() {
        let fx = Fixture::new();
        let mut menu = fx.menu();
        fx.selector.set_custom_sound("/chime.ogg").unwrap();

        let input = tokio_test::io::Builder::new()
            .read(b"1\n")
            .read(b"0.05\n")
            .read(b"1\n")
            .read(b"2\n")
            .wait(Duration::from_secs(7))
            .read(b"5\n")
            .read(b"2\n")
            .read(b"6\n")
            .build();
        menu.run(tokio::io::BufReader::new(input), std::future::pending::<()>())
            .await
            .unwrap();

        let out = output(menu);
        assert!(out.contains("Timer started with interval: 3 seconds"));
        assert!(out.contains("Timer is already running (every 3 seconds, 0 alarm(s) so far)."));
        assert!(out.contains("Current sound stopped."));
        assert!(out.contains("Timer stopped after 2 alarm(s)."));

        assert_eq!(fx.fired.lock().unwrap().len(), 2);
        let plays = fx.backend.plays();
        assert_eq!(plays.len(), 2);
        assert!(plays.iter().all(|p| p.kind() == SourceKind::Custom));
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_timer() {
        let fx = Fixture::new();
        let mut menu = fx.menu();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        // Keep the writer open so the menu waits for more input
        let (mut keyboard, stdin) = tokio::io::duplex(64);
        keyboard.write_all(b"1\n20\n").await.unwrap();
        let shutdown = async move {
            let _ = rx.await;
        };

        let run = async {
            menu.run(tokio::io::BufReader::new(stdin), shutdown)
                .await
                .unwrap();
        };
        let trigger = async {
            tokio::task::yield_now().await;
            tx.send(()).unwrap();
        };
        tokio::join!(run, trigger);
        drop(keyboard);

        let out = output(menu);
        assert!(out.contains("Timer started with interval: 20 minutes"));
        assert!(out.contains("Program interrupted."));
        assert!(out.contains("Timer stopped after 0 alarm(s)."));
    }
}
