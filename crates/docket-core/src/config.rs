use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "DOCKETRC";
const RC_FILE_NAME: &str = ".docketrc";
const DISABLED_RC: &str = "/dev/null";

/// Keys understood by the rest of the
/// crate, with their built-in values.
const DEFAULTS: [(&str, &str); 3] = [
  ("data.location", "~/.docket"),
  (
    "language",
    crate::i18n::DEFAULT_LANGUAGE
  ),
  ("color", "on")
];

/// Flat `key = value` settings merged
/// from defaults, rc files and command
/// line overrides, in that order.
#[derive(Debug, Clone)]
pub struct Config {
  settings:         HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      settings:     DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: Vec::new()
    }
  }
}

enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Setting {
    key:   &'a str,
    value: &'a str
  }
}

fn classify(
  raw: &str
) -> Option<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();

  if line.is_empty() {
    return Some(RcLine::Blank);
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    return Some(RcLine::Include(
      target.trim()
    ));
  }

  line.split_once('=').map(|(k, v)| {
    RcLine::Setting {
      key:   k.trim(),
      value: v.trim()
    }
  })
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_rc(rc_override)? {
      | Some(path) => {
        info!(docketrc = %path.display(), "reading docketrc");
        cfg.merge_file(&path)?;
      }
      | None => {
        debug!("running on built-in settings")
      }
    }

    Ok(cfg)
  }

  /// Applies `rc.key=value` pairs; the
  /// `rc.` prefix is optional.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = raw_key
        .strip_prefix("rc.")
        .map_or_else(
          || raw_key.clone(),
          str::to_string
        );
      debug!(key = %key, value = %value, "override applied");
      self.settings.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.settings.get(key).cloned()
  }

  /// `None` when unset; an error when
  /// set to something that is not a
  /// recognizable switch.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) =
      self.settings.get(key)
    else {
      return Ok(None);
    };
    parse_switch(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "{key} expects on/off, got \
           {raw:?}"
        )
      }
    )
  }

  pub fn get_path(
    &self,
    key: &str
  ) -> Option<PathBuf> {
    let raw = self.settings.get(key)?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| {
      expand_home(Path::new(trimmed))
    })
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.settings.iter()
  }

  #[tracing::instrument(skip(self))]
  fn merge_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_home(path);
    if self.loaded_files.contains(&path) {
      warn!(file = %path.display(), "include cycle; file already merged");
      return Ok(());
    }

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "cannot read docketrc {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let dir = path
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .to_path_buf();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let lineno = idx + 1;
      let Some(line) = classify(raw)
      else {
        bail!(
          "{}:{lineno}: expected \
           `key = value`, found {:?}",
          path.display(),
          raw.trim()
        );
      };

      match line {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let nested =
            include_target(&dir, target)?;
          if nested.exists() {
            debug!(from = %path.display(), include = %nested.display(), lineno, "following include");
            self.merge_file(&nested)?;
          } else {
            warn!(include = %nested.display(), "missing include skipped");
          }
        }
        | RcLine::Setting {
          key,
          value
        } => {
          trace!(key, value, "rc setting");
          self.settings.insert(
            key.to_string(),
            value.to_string()
          );
        }
      }
    }

    Ok(())
  }
}

/// The `--data` flag wins, then the
/// `data.location` setting, then
/// `~/.docket`.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(dir) = override_dir {
    return Ok(dir.to_path_buf());
  }
  if let Some(dir) =
    cfg.get_path("data.location")
  {
    return Ok(dir);
  }

  dirs::home_dir()
    .map(|home| home.join(".docket"))
    .ok_or_else(|| {
      anyhow!(
        "no home directory for the \
         default data location"
      )
    })
}

#[tracing::instrument(skip(
  explicit
))]
fn locate_rc(
  explicit: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = explicit {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    return Ok(
      (from_env != DISABLED_RC)
        .then(|| PathBuf::from(from_env))
    );
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!("no home directory; docketrc lookup skipped");
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  Ok(candidate.exists().then_some(candidate))
}

fn include_target(
  dir: &Path,
  target: &str
) -> anyhow::Result<PathBuf> {
  if target.is_empty() {
    bail!("include needs a path");
  }

  let expanded =
    expand_home(Path::new(target));
  Ok(if expanded.is_absolute() {
    expanded
  } else {
    dir.join(expanded)
  })
}

fn expand_home(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::PathBuf;

  use tempfile::tempdir;

  use super::{
    Config,
    resolve_data_dir
  };

  #[test]
  fn reads_keys_comments_and_includes()
  {
    let dir =
      tempdir().expect("tempdir");
    fs::write(
      dir.path().join("extra.rc"),
      "color = off\n"
    )
    .expect("write include");
    let rc = dir.path().join("docketrc");
    fs::write(
      &rc,
      "# docket settings\n\
       language = en # trailing\n\
       include extra.rc\n\
       data.location = /tmp/docket-test\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load rc");
    assert_eq!(
      cfg.get("language").as_deref(),
      Some("en")
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("bool"),
      Some(false)
    );
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      resolve_data_dir(&cfg, None)
        .expect("data dir"),
      PathBuf::from("/tmp/docket-test")
    );
  }

  #[test]
  fn include_cycles_are_merged_once() {
    let dir =
      tempdir().expect("tempdir");
    let a = dir.path().join("a.rc");
    let b = dir.path().join("b.rc");
    fs::write(&a, "include b.rc\nlanguage = en\n")
      .expect("write a");
    fs::write(&b, "include a.rc\ncolor = off\n")
      .expect("write b");

    let cfg = Config::load(Some(&a))
      .expect("cycle tolerated");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("language").as_deref(),
      Some("en")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.language".to_string(),
        "en".to_string()
      ),
      (
        "color".to_string(),
        "maybe".to_string()
      ),
    ]);
    assert_eq!(
      cfg.get("language").as_deref(),
      Some("en")
    );
    assert!(cfg.get_bool("color").is_err());
    assert_eq!(
      cfg.get_bool("missing").expect("unset"),
      None
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("docketrc");
    fs::write(&rc, "language en\n")
      .expect("write rc");
    assert!(Config::load(Some(&rc)).is_err());
  }

  #[test]
  fn data_flag_beats_setting() {
    let cfg = Config::default();
    let flag = PathBuf::from("/srv/docket");
    assert_eq!(
      resolve_data_dir(&cfg, Some(flag.as_path()))
        .expect("data dir"),
      flag
    );
  }
}
