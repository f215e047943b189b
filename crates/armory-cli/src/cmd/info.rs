//! Info command

use anyhow::{Result, bail};
use armory_core::ArmoryClient;
use armory_core::cache::CachedPackage;
use armory_schema::{ArmoryConfig, PackageManifest};
use crossterm::style::Stylize;

use crate::GlobalArgs;
use crate::ui::{Theme, table};

/// Show an armory's status and the packages providing `name`, or the
/// status of every armory
pub async fn info(global: &GlobalArgs, name: Option<&str>) -> Result<()> {
    let output = super::output(global);
    let client = super::refreshed_client(global, &output).await?;

    match name {
        Some(name) => {
            let armory = client.registry().get(name);
            let found = client.lookup(name);
            if armory.is_none() && found.is_empty() {
                bail!("no armory or package named '{name}' was found");
            }
            if let Some(armory) = armory {
                let rows: Vec<_> = armory_rows(&client)
                    .into_iter()
                    .filter(|(a, _, _)| a.name == armory.name)
                    .collect();
                println!("{}", table::armories(&rows));
            }
            let theme = Theme::default();
            for pkg in &found {
                print_package(&theme, pkg);
            }
        }
        None => println!("{}", table::armories(&armory_rows(&client))),
    }
    Ok(())
}

fn armory_rows(client: &ArmoryClient) -> Vec<(ArmoryConfig, usize, Option<String>)> {
    client
        .registry()
        .list()
        .into_iter()
        .map(|armory| {
            let count = client.cache().packages(Some(&armory.public_key)).len();
            let error = client.index_error(&armory).map(|e| e.to_string());
            (armory, count, error)
        })
        .collect()
}

fn print_package(theme: &Theme, pkg: &CachedPackage) {
    let width = theme.layout.name_width;
    let field = |label: &str, value: &str| {
        if !value.is_empty() {
            println!("  {} {value}", format!("{label:<width$}").dark_grey());
        }
    };

    println!();
    println!(
        "{} {} {}",
        pkg.name().with(theme.colors.package_name).bold(),
        pkg.version().with(theme.colors.version),
        format!("({})", pkg.kind()).dark_grey()
    );
    field("Armory", pkg.armory_name());
    field("Help", pkg.manifest.help());
    field("Commands", &pkg.manifest.command_names().join(", "));

    match &pkg.manifest {
        PackageManifest::Alias(alias) => {
            field("Author", &alias.original_author);
            field("Repository", &alias.repo_url);
            field("Entrypoint", &alias.entrypoint);
        }
        PackageManifest::Extension(ext) => {
            field("Author", &ext.extension_author);
            field("Original author", &ext.original_author);
            field("Repository", &ext.repo_url);
            let deps: Vec<&str> = ext
                .commands
                .iter()
                .map(|c| c.depends_on.as_str())
                .filter(|d| !d.is_empty())
                .collect();
            field("Depends on", &deps.join(", "));
        }
    }
    println!();
}
