use crate::engine::{Target, TargetState};
use crate::project::ProjectContext;
use crate::util;
use colored::*;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Converts the linked ELF into the flashable firmware image via objcopy.
pub struct FirmwareTarget {
    state: TargetState,
    preds: Vec<Arc<dyn Target>>,
    ctx: Arc<ProjectContext>,
    elf: PathBuf,
    image: PathBuf,
    format: String,
    version: Arc<dyn Target>,
    stderr: Mutex<Option<String>>,
}

impl FirmwareTarget {
    pub fn new(
        ctx: Arc<ProjectContext>,
        elf: PathBuf,
        link: Arc<dyn Target>,
        version: Arc<dyn Target>,
    ) -> Arc<Self> {
        let format = ctx
            .config
            .firmware
            .as_ref()
            .and_then(|fw| fw.format.clone())
            .unwrap_or_else(|| "bin".to_string());
        let extension = if format == "ihex" { "hex" } else { "bin" };
        let image = elf.with_extension(extension);

        Arc::new(Self {
            state: TargetState::new(),
            preds: vec![link],
            ctx,
            elf,
            image,
            format,
            version,
            stderr: Mutex::new(None),
        })
    }

    pub fn image(&self) -> &PathBuf {
        &self.image
    }
}

impl Target for FirmwareTarget {
    fn state(&self) -> &TargetState {
        &self.state
    }

    fn predecessors(&self) -> Vec<Arc<dyn Target>> {
        self.preds.clone()
    }

    fn prepare(&self) -> bool {
        let image_tick = util::mtime_tick(&self.image);
        if image_tick == util::MISSING_TICK {
            self.version.state().set_outdated();
            return true;
        }
        util::mtime_tick(&self.elf) > image_tick
    }

    fn execute(&self) -> bool {
        let objcopy_format = if self.format == "ihex" {
            "ihex"
        } else {
            "binary"
        };

        let output = match Command::new(&self.ctx.objcopy)
            .arg("-O")
            .arg(objcopy_format)
            .arg(&self.elf)
            .arg(&self.image)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                *self.stderr.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(format!("failed to run {}: {e}", self.ctx.objcopy));
                return false;
            }
        };

        if !output.status.success() {
            *self.stderr.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(String::from_utf8_lossy(&output.stderr).to_string());
            return false;
        }
        true
    }

    fn executed(&self) {
        match self
            .stderr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            None => self
                .ctx
                .report(&format!("   {} {}", "IMG".cyan(), self.image.display())),
            Some(stderr) => self.ctx.report(&format!(
                "{} Image conversion failed:\n{}",
                "x".red(),
                stderr
            )),
        }
    }
}
