//! Kernel module loading.

use std::path::Path;

use crate::command::{self, Runner};

/// Default loader binary.
pub const MODPROBE: &str = "modprobe";

/// Directory listing loaded and built-in modules.
pub const SYS_MODULE: &str = "/sys/module";

/// Loads `name` with the `modprobe` compatible `program`. Loading an already present module
/// succeeds.
pub async fn load(runner: &Runner, program: &str, name: &str) -> command::Result<()> {
    runner.run(program, [name]).await?;
    Ok(())
}

/// Returns `true` if `name` is registered under `sys_module`, i.e. loaded or built in.
pub fn is_loaded(sys_module: impl AsRef<Path>, name: &str) -> bool {
    sys_module.as_ref().join(name).exists()
}
