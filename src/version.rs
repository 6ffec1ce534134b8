//! Version and build information

use std::fmt;

use crate::persona::PersonaRegistry;
use crate::stages::StageCatalog;

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub name: &'static str,
    /// Git commit hash (short)
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    git_dirty_str: &'static str,
    pub build_timestamp: &'static str,
    /// Target triple (e.g., x86_64-unknown-linux-gnu)
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            name: env!("CARGO_PKG_NAME"),
            git_hash: env!("PILOT_GIT_HASH"),
            git_branch: env!("PILOT_GIT_BRANCH"),
            git_dirty_str: env!("PILOT_GIT_DIRTY"),
            build_timestamp: env!("PILOT_BUILD_TIMESTAMP"),
            target: env!("PILOT_TARGET"),
            profile: env!("PILOT_PROFILE"),
            rustc_version: env!("PILOT_RUSTC_VERSION"),
        }
    }

    pub fn git_dirty(&self) -> bool {
        self.git_dirty_str == "true"
    }

    /// Full version string (e.g., "0.1.0-abc1234")
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Version:    {}", self.version)?;
        writeln!(f, "  Git Hash:   {}{}", self.git_hash, if self.git_dirty() { " (dirty)" } else { "" })?;
        writeln!(f, "  Git Branch: {}", self.git_branch)?;
        writeln!(f, "  Built:      {}", self.build_timestamp)?;
        writeln!(f, "  Profile:    {}", self.profile)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f, "  Compiler:   {}", self.rustc_version)?;
        Ok(())
    }
}

/// Print version information, including the bundled catalog sizes
pub fn print_version() {
    let info = BuildInfo::current();
    print!("{}", info);

    println!();
    println!("Bundled Catalogs:");
    match PersonaRegistry::bundled() {
        Ok(registry) => println!("  Personas:   {}", registry.len()),
        Err(e) => println!("  Personas:   unavailable ({})", e),
    }
    match StageCatalog::bundled() {
        Ok(catalog) => println!("  Stages:     {}", catalog.len()),
        Err(e) => println!("  Stages:     unavailable ({})", e),
    }
}
