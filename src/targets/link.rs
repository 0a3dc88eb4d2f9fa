use crate::engine::{Target, TargetState};
use crate::project::ProjectContext;
use crate::util;
use colored::*;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Links every object file into the firmware ELF.
///
/// A missing ELF also marks the version target outdated: the stamp must be
/// regenerated whenever the final artifacts are rebuilt from nothing, and
/// routing that decision through `set_outdated` during prepare lets the
/// promotion sweep pick it up like any other staleness.
pub struct LinkTarget {
    state: TargetState,
    preds: Vec<Arc<dyn Target>>,
    ctx: Arc<ProjectContext>,
    objects: Vec<PathBuf>,
    output: PathBuf,
    version: Arc<dyn Target>,
    stderr: Mutex<Option<String>>,
}

impl LinkTarget {
    pub fn new(
        ctx: Arc<ProjectContext>,
        objects: Vec<PathBuf>,
        output: PathBuf,
        preds: Vec<Arc<dyn Target>>,
        version: Arc<dyn Target>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: TargetState::new(),
            preds,
            ctx,
            objects,
            output,
            version,
            stderr: Mutex::new(None),
        })
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }
}

impl Target for LinkTarget {
    fn state(&self) -> &TargetState {
        &self.state
    }

    fn predecessors(&self) -> Vec<Arc<dyn Target>> {
        self.preds.clone()
    }

    fn prepare(&self) -> bool {
        let output_tick = util::mtime_tick(&self.output);
        if output_tick == util::MISSING_TICK {
            self.version.state().set_outdated();
            return true;
        }

        // Objects rebuilt in this run are handled by promotion; this catches
        // objects touched behind the engine's back.
        self.objects
            .iter()
            .any(|object| util::mtime_tick(object) > output_tick)
    }

    fn execute(&self) -> bool {
        let config = &self.ctx.config;
        let mut cmd = Command::new(&self.ctx.compiler);
        cmd.args(&self.objects);
        cmd.arg("-o").arg(&self.output);

        if let Some(build_cfg) = &config.build {
            if let Some(mcu) = &build_cfg.mcu {
                cmd.arg(format!("-mcpu={mcu}"));
                cmd.arg("-mthumb");
            }
            if let Some(script) = &build_cfg.linker_script {
                cmd.arg(format!("-T{script}"));
            }
            if let Some(ldflags) = &build_cfg.ldflags {
                cmd.args(ldflags);
            }
            if let Some(libs) = &build_cfg.libs {
                for lib in libs {
                    cmd.arg(format!("-l{lib}"));
                }
            }
        }

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                *self.stderr.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(format!("failed to run {}: {e}", self.ctx.compiler));
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
                .report(&format!("   {} {}", "LD".cyan(), self.output.display())),
            Some(stderr) => self.ctx.report(&format!(
                "{} Linking failed:\n{}",
                "x".red(),
                stderr
            )),
        }
    }
}
