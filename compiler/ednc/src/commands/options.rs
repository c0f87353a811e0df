//! Command-line options shared by `emit` and `check`.

use std::path::PathBuf;

#[cfg(feature = "llvm")]
use edn_emit::EmitConfig;

/// Exception models selectable with `--eh=`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EhModel {
    Itanium,
    Seh,
    /// Both requested; the target picks one.
    Both,
}

impl EhModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "itanium" => Some(EhModel::Itanium),
            "seh" => Some(EhModel::Seh),
            "both" => Some(EhModel::Both),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Run the backend verifier on the emitted module.
    pub verify: bool,
    /// Write the module here instead of stdout.
    pub output: Option<PathBuf>,
    pub eh: Option<EhModel>,
    pub panic_unwind: bool,
    pub coroutines: bool,
    pub target: Option<String>,
}

#[cfg(feature = "llvm")]
impl EmitOptions {
    /// The environment's configuration with these options on top.
    pub fn config(&self) -> EmitConfig {
        self.apply(EmitConfig::from_env())
    }

    /// `base` with every option that was given on the command line applied.
    pub fn apply(&self, base: EmitConfig) -> EmitConfig {
        let mut config = base;
        if let Some(eh) = self.eh {
            config = match eh {
                EhModel::Itanium => config.with_eh_models(true, false),
                EhModel::Seh => config.with_eh_models(false, true),
                EhModel::Both => config.with_eh_models(true, true),
            };
        }
        if self.panic_unwind {
            config = config.with_panic_unwind(true);
        }
        if self.coroutines {
            config = config.with_coroutines(true);
        }
        if let Some(target) = &self.target {
            config = config.with_target_triple(target.clone());
        }
        config
    }
}

/// Parse options from the arguments after the command name. The first
/// argument that is not a flag is returned as the input path.
pub fn parse_emit_options(args: &[String]) -> (Option<String>, EmitOptions) {
    let mut options = EmitOptions::default();
    let mut path = None;
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "-o" && i + 1 < args.len() {
            options.output = Some(PathBuf::from(&args[i + 1]));
            i += 2;
            continue;
        }
        if arg == "--verify" {
            options.verify = true;
        } else if let Some(output) = arg.strip_prefix("--output=") {
            options.output = Some(PathBuf::from(output));
        } else if let Some(model) = arg.strip_prefix("--eh=") {
            match EhModel::parse(model) {
                Some(eh) => options.eh = Some(eh),
                None => eprintln!(
                    "warning: unknown exception model '{model}', options: itanium, seh, both"
                ),
            }
        } else if let Some(mode) = arg.strip_prefix("--panic=") {
            if mode == "unwind" {
                options.panic_unwind = true;
            } else {
                eprintln!("warning: unknown panic mode '{mode}', options: unwind");
            }
        } else if arg == "--coro" {
            options.coroutines = true;
        } else if let Some(target) = arg.strip_prefix("--target=") {
            options.target = Some(target.to_owned());
        } else if arg.starts_with('-') {
            eprintln!("warning: unknown option '{arg}'");
        } else if path.is_none() {
            path = Some(arg.to_owned());
        }
        i += 1;
    }
    (path, options)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn path_and_flags_in_any_order() {
        let (path, options) = parse_emit_options(&args(&["--verify", "m.edn", "-o", "m.ll"]));
        assert_eq!(path.as_deref(), Some("m.edn"));
        assert!(options.verify);
        assert_eq!(options.output, Some(PathBuf::from("m.ll")));
    }

    #[test]
    fn eh_models() {
        for (flag, expected) in [
            ("--eh=itanium", EhModel::Itanium),
            ("--eh=seh", EhModel::Seh),
            ("--eh=both", EhModel::Both),
        ] {
            let (_, options) = parse_emit_options(&args(&[flag]));
            assert_eq!(options.eh, Some(expected));
        }
        let (_, options) = parse_emit_options(&args(&["--eh=dwarf"]));
        assert_eq!(options.eh, None);
    }

    #[cfg(feature = "llvm")]
    #[test]
    fn flags_override_the_environment() {
        let env = EmitConfig::from_lookup(|key| match key {
            "EDN_EH_MODEL" => Some("seh".to_owned()),
            "EDN_TARGET_TRIPLE" => Some("x86_64-pc-windows-msvc".to_owned()),
            _ => None,
        });
        let (_, options) = parse_emit_options(&args(&[
            "--eh=itanium",
            "--panic=unwind",
            "--coro",
            "--target=x86_64-unknown-linux-gnu",
        ]));
        let config = options.apply(env);
        assert!(config.eh_enabled);
        assert!(config.eh_itanium);
        assert!(!config.eh_seh);
        assert!(config.panic_unwind);
        assert!(config.coroutines);
        assert_eq!(config.target_triple.as_deref(), Some("x86_64-unknown-linux-gnu"));
    }

    #[cfg(feature = "llvm")]
    #[test]
    fn no_flags_keep_the_environment() {
        let env = EmitConfig::from_lookup(|key| match key {
            "EDN_EH_MODEL" => Some("seh".to_owned()),
            "EDN_ENABLE_EH" => Some("1".to_owned()),
            _ => None,
        });
        let config = EmitOptions::default().apply(env.clone());
        assert_eq!(config, env);
    }
}
