//! Emission configuration.
//!
//! [`EmitConfig::from_env`] reads the `EDN_*` environment variables; the
//! `with_*` methods override individual settings on top of that, which is
//! how the driver applies its command-line flags.

use std::fmt;

/// Exception-handling personality a module is emitted under.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Personality {
    /// Landing pads and `resume`.
    Itanium,
    /// Windows structured exception handling funclets.
    Seh,
}

impl Personality {
    /// Name of the personality routine.
    pub fn symbol(self) -> &'static str {
        match self {
            Personality::Itanium => "__gxx_personality_v0",
            Personality::Seh => "__C_specific_handler",
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Personality::Itanium => write!(f, "itanium"),
            Personality::Seh => write!(f, "seh"),
        }
    }
}

/// Knobs that change how bodies are lowered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmitConfig {
    /// Itanium exception model requested.
    pub eh_itanium: bool,
    /// SEH exception model requested.
    pub eh_seh: bool,
    /// Exception lowering switched on. Without it the requested personality
    /// is still recorded but `try`/`call`/`panic` lower as plain control flow.
    pub eh_enabled: bool,
    /// `panic` unwinds instead of trapping.
    pub panic_unwind: bool,
    /// Coroutine ops emit `llvm.coro.*` intrinsics.
    pub coroutines: bool,
    pub target_triple: Option<String>,
}

impl EmitConfig {
    /// Configuration from the process environment.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `EDN_EH_MODEL=itanium\|seh` | request an exception model |
    /// | `EDN_ENABLE_EH=1` | enable exception lowering |
    /// | `EDN_PANIC=unwind` | unwinding panics |
    /// | `EDN_ENABLE_CORO=1` | coroutine intrinsics |
    /// | `EDN_TARGET_TRIPLE` | module target triple |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EmitConfig::from_env`] with a custom variable source.
    /// Empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.is_empty());
        let model = get("EDN_EH_MODEL").map(|m| m.to_ascii_lowercase());
        EmitConfig {
            eh_itanium: model.as_deref() == Some("itanium"),
            eh_seh: model.as_deref() == Some("seh"),
            eh_enabled: get("EDN_ENABLE_EH").as_deref() == Some("1"),
            panic_unwind: get("EDN_PANIC").as_deref() == Some("unwind"),
            coroutines: get("EDN_ENABLE_CORO").as_deref() == Some("1"),
            target_triple: get("EDN_TARGET_TRIPLE"),
        }
    }

    /// Request exception models and enable exception lowering when at
    /// least one is requested.
    #[must_use]
    pub fn with_eh_models(mut self, itanium: bool, seh: bool) -> Self {
        self.eh_itanium = itanium;
        self.eh_seh = seh;
        self.eh_enabled = itanium || seh;
        self
    }

    #[must_use]
    pub fn with_panic_unwind(mut self, unwind: bool) -> Self {
        self.panic_unwind = unwind;
        self
    }

    #[must_use]
    pub fn with_coroutines(mut self, enabled: bool) -> Self {
        self.coroutines = enabled;
        self
    }

    #[must_use]
    pub fn with_target_triple(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = Some(triple.into());
        self
    }

    /// True when the target is Windows. Falls back to the host when no
    /// triple is configured.
    pub fn is_windows_target(&self) -> bool {
        match &self.target_triple {
            Some(triple) => triple.contains("windows") || triple.contains("msvc"),
            None => cfg!(windows),
        }
    }

    /// The requested personality, whether or not exception lowering is on.
    ///
    /// With both models requested, SEH wins on Windows targets and Itanium
    /// everywhere else.
    pub fn personality(&self) -> Option<Personality> {
        match (self.eh_itanium, self.eh_seh) {
            (true, true) if self.is_windows_target() => Some(Personality::Seh),
            (true, _) => Some(Personality::Itanium),
            (false, true) => Some(Personality::Seh),
            (false, false) => None,
        }
    }

    /// The personality bodies are lowered under: the requested one, only
    /// while exception lowering is enabled.
    pub fn lowering_personality(&self) -> Option<Personality> {
        self.personality().filter(|_| self.eh_enabled)
    }
}

#[cfg(test)]
mod tests;
