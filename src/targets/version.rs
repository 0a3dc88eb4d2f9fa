use crate::engine::{Target, TargetState};
use crate::project::ProjectContext;
use colored::*;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Regenerates the build-stamp source file.
///
/// The target stays clean unless the stamp file is missing or another target
/// (the linker or the image target, on discovering a missing output) marks it
/// outdated through the prepare side-channel. Executing bumps the build
/// number, which makes the stamp's own compile target stale and ripples a
/// fresh stamp into the final image.
pub struct VersionTarget {
    state: TargetState,
    ctx: Arc<ProjectContext>,
    source: PathBuf,
    stamped: Mutex<Option<u64>>,
}

impl VersionTarget {
    pub fn new(ctx: Arc<ProjectContext>, source: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            state: TargetState::new(),
            ctx,
            source,
            stamped: Mutex::new(None),
        })
    }
}

impl Target for VersionTarget {
    fn state(&self) -> &TargetState {
        &self.state
    }

    fn predecessors(&self) -> Vec<Arc<dyn Target>> {
        Vec::new()
    }

    fn prepare(&self) -> bool {
        !self.source.exists()
    }

    fn execute(&self) -> bool {
        let previous = fs::read_to_string(&self.source)
            .map(|content| parse_build_number(&content))
            .unwrap_or(0);
        let next = previous + 1;

        let content = render_stamp(next);
        if let Some(parent) = self.source.parent() {
            if fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        if fs::write(&self.source, content).is_err() {
            return false;
        }

        *self.stamped.lock().unwrap_or_else(|e| e.into_inner()) = Some(next);
        true
    }

    fn executed(&self) {
        match *self.stamped.lock().unwrap_or_else(|e| e.into_inner()) {
            Some(build) => self.ctx.report(&format!(
                "   {} {} (build {})",
                "GEN".magenta(),
                self.source.display(),
                build
            )),
            None => self.ctx.report(&format!(
                "{} Failed to write {}",
                "x".red(),
                self.source.display()
            )),
        }
    }
}

fn render_stamp(build: u64) -> String {
    format!(
        "/* Auto-generated by mcx; do not edit. */\n\
         const unsigned long g_firmware_build = {build}UL;\n\
         const char *const g_firmware_build_tag = \"build-{build}\";\n"
    )
}

fn parse_build_number(content: &str) -> u64 {
    content
        .split("g_firmware_build = ")
        .nth(1)
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(0)
}
