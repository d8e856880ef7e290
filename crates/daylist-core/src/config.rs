use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const CONFIG_ENV_VAR: &str =
  "DAYLISTRC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.daylist".to_string()
    );
    map.insert(
      "default.status".to_string(),
      "active".to_string()
    );
    map.insert(
      "default.scope".to_string(),
      "today".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_config_path(
      config_override
    )?;
    if let Some(path) = rc {
      info!(config = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

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
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `None` when the key is unset; an
  /// error for values that are neither
  /// on nor off.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid {key} setting: \
           {raw}"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self.load_str(&text, &path)
  }

  fn load_str(
    &mut self,
    text: &str,
    path: &Path
  ) -> anyhow::Result<()> {
    self
      .loaded_files
      .push(path.to_path_buf());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle; skipping");
        } else if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(".daylistrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".daylist"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
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

fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
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

  use tempfile::tempdir;

  use super::{
    Config,
    resolve_data_dir
  };

  #[test]
  fn file_includes_and_overrides() {
    let temp =
      tempdir().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "default.scope = work\n"
    )
    .expect("write include");
    let main = temp.path().join("main.rc");
    fs::write(
      &main,
      "# daylist\ncolor = off # no ansi\ninclude extra.rc\ninclude missing.rc\n"
    )
    .expect("write main");

    let mut cfg = Config::load(Some(main.as_path()))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color flag"),
      Some(false)
    );
    assert_eq!(
      cfg.get("default.scope").as_deref(),
      Some("work")
    );
    assert_eq!(
      cfg.get("default.status").as_deref(),
      Some("active")
    );

    cfg.apply_overrides(vec![(
      "rc.default.status".to_string(),
      "all".to_string()
    )]);
    assert_eq!(
      cfg.get("default.status").as_deref(),
      Some("all")
    );
  }

  #[test]
  fn bool_keys_accept_on_off_words_only()
  {
    let mut cfg = Config::default();
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("default"),
      Some(true)
    );
    assert_eq!(
      cfg
        .get_bool("missing")
        .expect("unset"),
      None
    );

    for (raw, want) in [
      (" No ", false),
      ("0", false),
      ("YES", true),
      ("true", true)
    ] {
      cfg.apply_overrides(vec![(
        "color".to_string(),
        raw.to_string()
      )]);
      assert_eq!(
        cfg
          .get_bool("color")
          .expect("valid flag"),
        Some(want)
      );
    }

    cfg.apply_overrides(vec![(
      "rc.color".to_string(),
      "sometimes".to_string()
    )]);
    let err = cfg
      .get_bool("color")
      .expect_err("invalid flag");
    assert!(
      err
        .to_string()
        .contains("sometimes")
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp =
      tempdir().expect("tempdir");
    let path = temp.path().join("bad.rc");
    fs::write(&path, "color on\n")
      .expect("write");
    assert!(
      Config::load(Some(path.as_path())).is_err()
    );
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp =
      tempdir().expect("tempdir");
    let target =
      temp.path().join("a").join("b");
    let dir = resolve_data_dir(
      &Config::default(),
      Some(target.as_path())
    )
    .expect("resolve data dir");
    assert_eq!(dir, target);
    assert!(target.is_dir());
  }
}
