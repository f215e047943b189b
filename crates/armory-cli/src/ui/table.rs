//! Table rendering for package, bundle and armory listings.

use std::collections::HashSet;

use armory_core::cache::CachedPackage;
use armory_schema::{ArmoryBundle, ArmoryConfig, PackageKind};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};

fn base(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::DarkGrey)));
    table
}

/// One row per package, sorted by armory then command name.
///
/// Rows whose command is in `installed` are marked.
pub fn packages(packages: &[CachedPackage], installed: &HashSet<String>) -> Table {
    let mut rows: Vec<&CachedPackage> = packages.iter().collect();
    rows.sort_by(|a, b| {
        a.armory_name()
            .cmp(b.armory_name())
            .then_with(|| a.package.command_name.cmp(&b.package.command_name))
    });

    let mut table = base(&["Armory", "Command", "Version", "Type", "Help", "Installed"]);
    for pkg in rows {
        let kind_color = match pkg.kind() {
            PackageKind::Alias => Color::Blue,
            PackageKind::Extension => Color::Magenta,
        };
        let is_installed = installed.contains(&pkg.package.command_name);
        table.add_row(vec![
            Cell::new(pkg.armory_name()),
            Cell::new(&pkg.package.command_name).fg(Color::Cyan),
            Cell::new(pkg.version()),
            Cell::new(pkg.kind()).fg(kind_color),
            Cell::new(pkg.manifest.help()),
            if is_installed {
                Cell::new("✓").fg(Color::Green)
            } else {
                Cell::new("")
            },
        ]);
    }
    table
}

/// One row per bundle.
pub fn bundles(bundles: &[ArmoryBundle]) -> Table {
    let mut table = base(&["Armory", "Bundle", "Packages"]);
    for bundle in bundles {
        table.add_row(vec![
            Cell::new(&bundle.armory_name),
            Cell::new(&bundle.name).fg(Color::Cyan),
            Cell::new(bundle.packages.join(", ")),
        ]);
    }
    table
}

/// Per-armory status: `(config, cached package count, index error)`.
pub fn armories(rows: &[(ArmoryConfig, usize, Option<String>)]) -> Table {
    let mut table = base(&["Name", "URL", "Auth", "Enabled", "Packages", "Status"]);
    for (armory, count, error) in rows {
        let (status, color) = match (armory.enabled, error) {
            (false, _) => ("disabled".to_string(), Color::DarkGrey),
            (true, Some(e)) => (e.clone(), Color::Red),
            (true, None) => ("ok".to_string(), Color::Green),
        };
        table.add_row(vec![
            Cell::new(&armory.name).fg(Color::Magenta),
            Cell::new(&armory.repo_url),
            Cell::new(if armory.requires_auth() { "yes" } else { "no" }),
            Cell::new(if armory.enabled { "yes" } else { "no" }),
            Cell::new(count),
            Cell::new(status).fg(color),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armory_status_column() {
        let mut disabled = ArmoryConfig::builtin_default();
        disabled.enabled = false;
        let mut broken = ArmoryConfig::builtin_default();
        broken.name = "broken".to_string();

        let rendered = armories(&[
            (disabled, 0, None),
            (broken, 0, Some("HTTP 404".to_string())),
        ])
        .to_string();

        assert!(rendered.contains("disabled"));
        assert!(rendered.contains("HTTP 404"));
        assert!(rendered.contains("broken"));
    }

    #[test]
    fn test_bundle_members_joined() {
        let rendered = bundles(&[ArmoryBundle {
            name: "creds".to_string(),
            packages: vec!["nanodump".to_string(), "mimikatz".to_string()],
            armory_name: "Default".to_string(),
        }])
        .to_string();
        assert!(rendered.contains("nanodump, mimikatz"));
    }
}
