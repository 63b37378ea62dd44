use crate::models::catalog::{Firmware, Jailbreak};
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

const GUIDE_BASE_URL: &str = "https://ios.cfw.guide";

/// Device families counted in firmware summaries, with their display names.
const DEVICE_FAMILIES: [(&str, &str); 5] = [
    ("iPhone", "iPhone"),
    ("iPod", "iPod"),
    ("iPad", "iPad"),
    ("AppleTV", "Apple TV"),
    ("Watch", "Apple Watch"),
];

pub struct DisplayFormatter;

impl DisplayFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format_header(&self, text: &str) -> String {
        format!("\n=== {} ===", text.bright_white().bold())
    }

    pub fn format_table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

        table.add_row(Row::new(
            headers.iter().map(|h| Cell::new(h).style_spec("b")).collect(),
        ));

        for row in rows {
            table.add_row(Row::new(row.iter().map(|cell| Cell::new(cell)).collect()));
        }

        table.to_string()
    }

    pub fn format_jailbreak(&self, jb: &Jailbreak, install_link: Option<&str>) -> String {
        let mut output = vec![self.format_header(&jb.name)];

        match &jb.info {
            Some(info) => {
                output.push(format!("Version: {}", info.latest_ver.as_deref().unwrap_or("Unknown")));
                output.push(format!("Compatible with: {}", compatibility(&info.firmwares, info.soc.as_deref())));
                if let Some(kind) = &info.kind {
                    output.push(format!("Type: {}", kind));
                }
                if let Some(website) = &info.website {
                    output.push(format!("Website: {}", website.url));
                }
                for guide in &info.guide {
                    output.push(format!("{} Guide: {}{}", guide.name, GUIDE_BASE_URL, guide.url));
                }
                if let Some(notes) = &info.notes {
                    output.push(format!("Notes: {}", notes));
                }
            }
            None => output.push("No info available.".to_string()),
        }

        match install_link {
            Some(link) => output.push(format!("Install with Jailbreaks.app: {}", link.green())),
            None => output.push(format!("Install with Jailbreaks.app: {}", "unavailable".dimmed())),
        }

        output.join("\n")
    }

    pub fn format_firmware(&self, fw: &Firmware) -> String {
        let mut output = vec![self.format_header(&format!("iOS {}", fw.version))];
        output.push(format!("Build number: {}", fw.build));
        if let Some(released) = &fw.released {
            output.push(format!("Release date: {}", released));
        }

        let counts = device_counts(&fw.devices);
        let total: usize = counts.iter().map(|(_, count)| count).sum();
        let rows: Vec<Vec<String>> = counts
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(family, count)| vec![family.to_string(), count.to_string()])
            .collect();
        output.push(format!("\nSupported devices ({} total):", total));
        output.push(self.format_table(&["Family", "Devices"], &rows));

        output.join("\n")
    }

    pub fn format_choices(&self, choices: &[String]) -> String {
        if choices.is_empty() {
            return "No matches".dimmed().to_string();
        }
        choices
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("{:>2}. {}", i + 1, choice))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for DisplayFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// "iOS 15.0-16.6.1" for a range, comma separated for longer lists.
fn compatibility(firmwares: &[String], soc: Option<&str>) -> String {
    if firmwares.is_empty() {
        return "Unavailable".to_string();
    }
    let versions = if firmwares.len() > 2 {
        firmwares.join(", ")
    } else {
        firmwares.join("-")
    };
    match soc {
        Some(soc) => format!("iOS {} (works with {})", versions, soc),
        None => format!("iOS {}", versions),
    }
}

/// Devices per family, in display order. A device counts once per family
/// whose marker it contains.
pub fn device_counts(devices: &[String]) -> Vec<(&'static str, usize)> {
    DEVICE_FAMILIES
        .iter()
        .map(|(marker, label)| {
            let count = devices.iter().filter(|device| device.contains(marker)).count();
            (*label, count)
        })
        .collect()
}
