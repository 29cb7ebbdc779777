//! view-bundler CLI: render templates and build asset bundles from the command line.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use view_bundler::assets::{fingerprint, AssetBundler, BundleCache, WorkingRootFetcher};
use view_bundler::{
  PlaceholderExecutor, RenderEngine, RendererAttributes, RendererConfig, RequestContext,
};

#[derive(Parser)]
#[command(name = "view-bundler")]
#[command(version, about = "Render view templates and bundle their assets", long_about = None)]
struct Cli {
  /// Working root for local assets, the cache directory and `view.config.json`
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Render a template to stdout
  Render {
    /// Template identifier, relative to the template directory or absolute
    template: String,

    /// Render data as a JSON object
    #[arg(long)]
    data: Option<String>,

    /// Template directory (overrides the configured one)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Annotate output and append the debug overlay
    #[arg(long)]
    debug: bool,

    /// Treat the request as an AJAX call
    #[arg(long)]
    ajax: bool,
  },

  /// Build bundles and print the rewritten attributes as JSON
  Bundle {
    /// Stylesheet reference as LOCATOR=GROUP
    #[arg(long = "css")]
    css: Vec<String>,

    /// Script locator, in bundle order
    #[arg(long = "js")]
    js: Vec<String>,
  },

  /// Print the fingerprint of an ordered locator group
  Fingerprint {
    /// Group key
    group: String,

    /// Locators in bundle order
    locators: Vec<String>,

    /// Cache-busting version (defaults to the configured one)
    #[arg(long)]
    version: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "view_bundler=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();
  let root = match cli.root {
    Some(root) => root,
    None => std::env::current_dir().context("failed to determine the working directory")?,
  };
  let config = RendererConfig::discover(&root);

  match cli.command {
    Commands::Render {
      template,
      data,
      templates,
      debug,
      ajax,
    } => {
      let request = RequestContext::new(&root).with_debug(debug).with_ajax(ajax);
      let mut engine = RenderEngine::from_config(&config, PlaceholderExecutor, request);
      if let Some(templates) = templates {
        engine.set_template_path(&templates.to_string_lossy());
      }
      let data = parse_data(data.as_deref())?;
      let body = engine.render(Vec::new(), &template, &data)?;
      std::io::stdout()
        .write_all(&body)
        .context("failed to write to stdout")?;
    }
    Commands::Bundle { css, js } => {
      let mut attributes = RendererAttributes::new();
      let mut css_refs = Map::new();
      for entry in css {
        let (locator, group) = entry
          .split_once('=')
          .ok_or_else(|| anyhow!("expected LOCATOR=GROUP, got `{entry}`"))?;
        css_refs.insert(locator.to_string(), Value::String(group.to_string()));
      }
      if !css_refs.is_empty() {
        attributes.set(config.css_attribute.clone(), Value::Object(css_refs))?;
      }
      if !js.is_empty() {
        let locators = js.into_iter().map(Value::String).collect();
        attributes.set(config.js_attribute.clone(), Value::Array(locators))?;
      }

      let fetcher = WorkingRootFetcher::new(&root, config.http_timeout());
      let cache = BundleCache::new(config.cache_dir_path(&root), &config.cache_url_prefix, fetcher);
      let bundler = AssetBundler::new(
        cache,
        config.asset_version.clone(),
        config.css_attribute.clone(),
        config.js_attribute.clone(),
      );
      bundler.bundle(&mut attributes)?;
      println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(attributes.as_map().clone()))?
      );
    }
    Commands::Fingerprint {
      group,
      locators,
      version,
    } => {
      let version = version.unwrap_or(config.asset_version);
      println!("{}", fingerprint(locators.as_slice(), &group, &version));
    }
  }

  Ok(())
}

fn parse_data(raw: Option<&str>) -> Result<Map<String, Value>> {
  let Some(raw) = raw else {
    return Ok(Map::new());
  };
  match serde_json::from_str::<Value>(raw).context("failed to parse --data as JSON")? {
    Value::Object(map) => Ok(map),
    other => Err(anyhow!("--data must be a JSON object, got {other}")),
  }
}
