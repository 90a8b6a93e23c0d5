use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use kore_bridge::OllamaProvider;
use kore_bridge::providers::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use kore_stack::config::{self, Config};
use std::path::Path;

const BANNER: &str = r"
    ---------------------------------

    ██╗  ██╗ ██████╗ ██████╗ ███████╗
    ██║ ██╔╝██╔═══██╗██╔══██╗██╔════╝
    █████╔╝ ██║   ██║██████╔╝█████╗
    ██╔═██╗ ██║   ██║██╔══██╗██╔══╝
    ██║  ██╗╚██████╔╝██║  ██║███████╗
    ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝╚══════╝

    ---------------------------------
";

const NO_COMPLEX_MODEL: &str = "(none, always use the main model)";

pub const DEFAULT_CATALOG: &str = r#"# Tools used to judge how hard a query is to route.
# A query naming one tool stays on the main model; chains, conditionals and
# open-ended requests go to the complex model when one is configured.

[[tools]]
name = "web_search"
description = "Search the web"
keywords = ["search", "look up", "google"]
outputs = ["urls"]

[[tools]]
name = "fetch_page"
description = "Download a web page"
keywords = ["fetch", "download", "open page"]
inputs = ["urls"]
outputs = ["html"]

[[tools]]
name = "summarize"
description = "Summarize a document"
keywords = ["summarize", "summary", "tl;dr"]
inputs = ["html", "text"]
outputs = ["text"]

[[tools]]
name = "calculator"
description = "Evaluate arithmetic"
keywords = ["calculate", "compute", "sum"]
outputs = ["number"]
"#;

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn ensure_file(path: &Path, content: &str) -> Result<bool> {
    if !path.exists() {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn setup_base_url() -> Result<String> {
    let base_url: String = Input::new()
        .with_prompt("Ollama server URL")
        .default(DEFAULT_BASE_URL.to_string())
        .interact_text()
        .context("Failed to read server URL")?;

    Ok(base_url.trim().trim_end_matches('/').to_string())
}

fn pick(prompt: &str, items: &[String]) -> Result<usize> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .with_context(|| format!("Failed to select: {}", prompt))
}

async fn setup_models(base_url: &str) -> Result<(String, Option<String>)> {
    let installed = match OllamaProvider::new()
        .with_base_url(base_url)
        .list_models()
        .await
    {
        Ok(models) => models,
        Err(e) => {
            eprintln!(
                "  {} Could not list models ({}), enter one by name",
                style("!").yellow(),
                e
            );
            Vec::new()
        }
    };

    if installed.is_empty() {
        let model: String = Input::new()
            .with_prompt("Model name")
            .default(DEFAULT_MODEL.to_string())
            .interact_text()
            .context("Failed to read model name")?;
        return Ok((model, None));
    }

    let model = installed[pick("Select your main model", &installed)?].clone();

    let mut complex_choices = vec![NO_COMPLEX_MODEL.to_string()];
    complex_choices.extend(installed.iter().filter(|m| **m != model).cloned());
    let selection = pick("Model for complex queries", &complex_choices)?;
    let complex_model = (selection > 0).then(|| complex_choices[selection].clone());

    Ok((model, complex_model))
}

pub async fn run_init() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to kore!").white().bold());
    println!(
        "  {}",
        style("This wizard connects a persistent mind to your local models.").dim()
    );
    println!();

    print_step(1, 3, "Ollama Server");
    let base_url = setup_base_url()?;

    print_step(2, 3, "Model Selection");
    let (model, complex_model) = setup_models(&base_url).await?;

    let mut config = Config::default();
    config.provider.model = model;
    config.provider.complex_model = complex_model;
    if base_url != DEFAULT_BASE_URL {
        config.provider.base_url = Some(base_url);
    }

    print_step(3, 3, "Storage");
    let kore_dir = config::ensure_kore_dir()?;

    let catalog_path = kore_dir.join("tools.toml");
    match ensure_file(&catalog_path, DEFAULT_CATALOG) {
        Ok(created) => {
            config.catalog = Some(catalog_path.clone());
            println!(
                "  {} Tool catalog {} at {}",
                style("✓").green(),
                if created { "created" } else { "kept" },
                style(catalog_path.display()).cyan()
            );
        }
        Err(e) => eprintln!(
            "  {} Warning: Could not create tool catalog: {}",
            style("!").yellow(),
            e
        ),
    }

    let mind = kore_stack::factory::open_mind(&config)?;
    println!(
        "  {} Mind ready at {} ({} memories)",
        style("✓").green(),
        style(config.database_path().display()).cyan(),
        mind.count()?
    );

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(config::get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("kore ask \"hello\"").cyan().bold()
    );
    println!();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kore_stack::ToolCatalog;
    use tempfile::TempDir;

    #[test]
    fn default_catalog_parses() {
        let catalog = ToolCatalog::from_toml(DEFAULT_CATALOG).unwrap();
        assert_eq!(catalog.len(), 4);
        let search = catalog.get("web_search").unwrap();
        assert!(search.feeds(catalog.get("fetch_page").unwrap()));
    }

    #[test]
    fn ensure_file_keeps_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tools.toml");
        assert!(ensure_file(&path, "first").unwrap());
        assert!(!ensure_file(&path, "second").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }
}
