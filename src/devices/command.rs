//! Status lights driven through their vendor command line tools.

use std::env;
use std::path::Path;
use std::process::{Command, Stdio};

use onair_core::{LightConfig, Rgb};
use onair_engine::{DeviceError, DeviceStatus, Result, StatusCommand, StatusDevice};
use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    status: DeviceStatus,
    /// Color the light is known to show, cleared on failure
    showing: Option<Rgb>,
}

/// Runs a configured command for every color change. The command is only
/// run again when the color differs from what the light already shows.
pub struct CommandDevice {
    name: String,
    argv: Vec<String>,
    off_on_exit: bool,
    state: Mutex<State>,
}

impl CommandDevice {
    pub fn from_config(config: &LightConfig) -> Self {
        Self {
            name: config.display_name().to_string(),
            argv: config.command.clone(),
            off_on_exit: config.off_on_exit,
            state: Mutex::new(State::default()),
        }
    }

    fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    fn run(&self, color: Rgb, category: &str) -> Result<()> {
        let program = self
            .program()
            .ok_or_else(|| DeviceError::CommandFailed("empty command".to_string()))?;
        let args: Vec<String> = self.argv[1..]
            .iter()
            .map(|arg| fill_placeholders(arg, color, category))
            .collect();

        debug!(device = %self.name, program, ?args, "running light command");
        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DeviceError::Disconnected(format!("cannot run {}: {}", program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DeviceError::CommandFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )))
        }
    }

    fn show(&self, color: Rgb, category: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.showing == Some(color) {
            return Ok(());
        }

        let result = self.run(color, category);
        match &result {
            Ok(()) => {
                state.showing = Some(color);
                state.status.last_color = Some(color);
                state.status.last_error = None;
            }
            Err(e) => {
                state.showing = None;
                state.status.connected = false;
                state.status.last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// Substitute `{r}`, `{g}`, `{b}`, `{hex}` and `{category}` in one argument.
fn fill_placeholders(arg: &str, color: Rgb, category: &str) -> String {
    arg.replace("{r}", &color.r.to_string())
        .replace("{g}", &color.g.to_string())
        .replace("{b}", &color.b.to_string())
        .replace("{hex}", &color.hex())
        .replace("{category}", category)
}

/// Whether `program` names an executable file, directly or through `PATH`.
fn resolves(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Path::new(program).is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

impl StatusDevice for CommandDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<()> {
        let mut state = self.state.lock();
        match self.program() {
            Some(program) if resolves(program) => {
                state.status.connected = true;
                state.status.last_error = None;
                Ok(())
            }
            program => {
                let error = DeviceError::Disconnected(format!(
                    "program {:?} not found",
                    program.unwrap_or_default()
                ));
                state.status.connected = false;
                state.status.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn disconnect(&self) {
        if self.off_on_exit && self.is_connected() {
            if let Err(e) = self.show(Rgb::OFF, "off") {
                warn!(device = %self.name, error = %e, "failed to turn light off");
            }
        }
        let mut state = self.state.lock();
        state.status.connected = false;
        state.showing = None;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().status.connected
    }

    fn set_color(&self, color: Rgb) -> Result<()> {
        self.show(color, "")
    }

    fn set_status(&self, command: &StatusCommand) -> Result<()> {
        let category = command.category.to_string().to_lowercase();
        self.show(command.color, &category)
    }

    fn status(&self) -> DeviceStatus {
        self.state.lock().status.clone()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use onair_core::Category;

    use super::*;

    fn device(script: &str, off_on_exit: bool) -> CommandDevice {
        CommandDevice::from_config(&LightConfig {
            name: Some("flag".to_string()),
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            off_on_exit,
        })
    }

    fn command(category: Category) -> StatusCommand {
        StatusCommand {
            category,
            color: category.color(),
            effective_in_use: category == Category::Busy,
            manual_busy: false,
            manual_free: false,
            ignore_until: None,
        }
    }

    #[test]
    fn test_fill_placeholders() {
        assert_eq!(
            fill_placeholders("{r},{g},{b}/{hex}/{category}", Rgb::YELLOW, "away"),
            "255,255,0/ffff00/away"
        );
    }

    #[test]
    fn test_runs_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let device = device(&format!("echo {{hex}} {{category}} >> {}", log.display()), true);

        device.connect().unwrap();
        device.set_status(&command(Category::Busy)).unwrap();
        device.set_status(&command(Category::Busy)).unwrap();
        device.set_status(&command(Category::Available)).unwrap();
        device.disconnect();

        let lines = fs::read_to_string(&log).unwrap();
        assert_eq!(lines, "ff0000 busy\n00ff00 available\n000000 off\n");
        assert!(!device.is_connected());
    }

    #[test]
    fn test_failing_command() {
        let device = device("echo nope >&2; exit 3", false);
        device.connect().unwrap();
        let error = device.set_color(Rgb::RED).unwrap_err();
        assert!(matches!(error, DeviceError::CommandFailed(ref msg) if msg.contains("nope")));
        assert!(!device.is_connected());
        assert!(device.status().last_error.is_some());
    }

    #[test]
    fn test_missing_program() {
        let device = CommandDevice::from_config(&LightConfig {
            name: None,
            command: vec!["definitely-not-a-light-tool".to_string()],
            off_on_exit: false,
        });
        assert_eq!(device.name(), "definitely-not-a-light-tool");
        assert!(matches!(device.connect(), Err(DeviceError::Disconnected(_))));
    }
}
