//! Firmware header export
//!
//! Writes the registry (or a selected subset) as a C header the firmware
//! side compiles against: one named constant per sensor id, grouped by
//! hardware category, a `{id, name, unit}` lookup table, and small inline
//! helpers that scan it. Output is deterministic for identical registry
//! contents and selection, so regenerating never churns firmware diffs.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{Result, SensorLinkError};
use crate::registry::RegistryEntry;
use sl_protocol::{END_BYTE, PROTOCOL_VERSION, START_BYTE};

/// Hardware category used for grouping constants.
fn category(entry: &RegistryEntry) -> &'static str {
    let hw = entry.hardware.to_lowercase();
    if hw.contains("cpu") || hw.contains("ryzen") || hw.contains("intel") {
        "CPU"
    } else if hw.contains("gpu") || hw.contains("nvidia") || hw.contains("radeon") {
        "GPU"
    } else if hw.contains("memory") || hw.contains("ram") {
        "RAM"
    } else if hw.contains("ssd") || hw.contains("nvme") || hw.contains("hdd") || hw.contains("disk")
    {
        "DISK"
    } else if hw.contains("network") || hw.contains("ethernet") || hw.contains("wifi") {
        "NET"
    } else if hw.contains("battery") {
        "BAT"
    } else {
        "SYS"
    }
}

/// Short vendor tag folded into constant names for uniqueness.
fn hardware_short(hardware: &str) -> &'static str {
    let hw = hardware.to_lowercase();
    if hw.contains("ryzen") {
        "RYZEN"
    } else if hw.contains("intel") {
        "INTEL"
    } else if hw.contains("nvidia") || hw.contains("geforce") || hw.contains("rtx") || hw.contains("gtx") {
        "NV"
    } else if hw.contains("radeon") || hw.contains("amd") {
        "AMD"
    } else if hw.contains("samsung") {
        "SAM"
    } else if hw.contains("crucial") {
        "CRU"
    } else if hw.contains("western") || hw.contains("wd") {
        "WD"
    } else if hw.contains("seagate") {
        "SEA"
    } else if hw.contains("kingston") {
        "KIN"
    } else if hw.contains("realtek") {
        "RTK"
    } else if hw.contains("wifi") || hw.contains("wireless") {
        "WIFI"
    } else {
        ""
    }
}

/// Build the C constant name for one entry:
/// `SENSOR_{CATEGORY}_{KIND}_{CLEANED_NAME}`.
fn constant_name(entry: &RegistryEntry) -> String {
    let name = entry
        .name
        .replace("°C", "")
        .replace('°', "")
        .replace('%', "PCT")
        .replace('#', "N");

    let mut clean = String::new();
    let mut last_was_underscore = false;
    for c in name.to_uppercase().chars() {
        if c.is_ascii_alphanumeric() {
            clean.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore && !clean.is_empty() {
            clean.push('_');
            last_was_underscore = true;
        }
    }
    let mut clean = clean.trim_end_matches('_').to_string();
    if clean.len() > 25 {
        clean.truncate(25);
        clean = clean.trim_end_matches('_').to_string();
    }

    let short = hardware_short(&entry.hardware);
    if !short.is_empty() && !clean.contains(short) {
        clean = format!("{}_{}", short, clean);
    }

    format!(
        "SENSOR_{}_{}_{}",
        category(entry),
        format!("{:?}", entry.kind).to_uppercase(),
        clean
    )
}

/// Assign each entry a unique constant name, suffixing repeats with `_2`,
/// `_3`, ... in id order.
fn unique_names(entries: &[(String, RegistryEntry)]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    let mut used: HashMap<String, u32> = HashMap::new();

    for (native_id, entry) in entries {
        let base = constant_name(entry);
        let count = used.entry(base.clone()).or_insert(0);
        *count += 1;
        let name = if *count == 1 {
            base
        } else {
            format!("{}_{}", base, count)
        };
        names.insert(native_id.clone(), name);
    }
    names
}

fn truncated(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Write `entries` (already sorted by id) as a firmware header at `path`.
pub fn write_header(entries: &[(String, RegistryEntry)], path: &Path) -> Result<()> {
    let names = unique_names(entries);

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sensor_ids.h");
    let guard: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("SENSOR_IDS")
        .to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "/**");
    let _ = writeln!(out, " * @file {}", file_name);
    let _ = writeln!(out, " * @brief SensorLink - sensor id map");
    let _ = writeln!(out, " * @note Auto-generated from sensor_map.json");
    let _ = writeln!(out, " */");
    let _ = writeln!(out);
    let _ = writeln!(out, "#ifndef {}_H", guard);
    let _ = writeln!(out, "#define {}_H", guard);
    let _ = writeln!(out);
    let _ = writeln!(out, "#include <stdint.h>");
    let _ = writeln!(out, "#include <stdbool.h>");
    let _ = writeln!(out);
    let _ = writeln!(out, "/* Protocol constants */");
    let _ = writeln!(out, "#define SL_PROTO_START   0x{:02X}", START_BYTE);
    let _ = writeln!(out, "#define SL_PROTO_END     0x{:02X}", END_BYTE);
    let _ = writeln!(out, "#define SL_PROTO_VERSION 0x{:02X}", PROTOCOL_VERSION);
    let _ = writeln!(out);
    let _ = writeln!(out, "/* Sensor ids */");
    let _ = writeln!(out);

    let mut categories: Vec<&'static str> = entries.iter().map(|(_, e)| category(e)).collect();
    categories.sort_unstable();
    categories.dedup();

    for cat in categories {
        let _ = writeln!(out, "/* {} */", cat);
        for (native_id, entry) in entries.iter().filter(|(_, e)| category(e) == cat) {
            let comment = truncated(&entry.name, 35);
            let _ = writeln!(
                out,
                "#define {:<45} 0x{:04X}  /* {} */",
                names[native_id], entry.id, comment
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "#define SL_SENSOR_COUNT  {}", entries.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "/* Sensor data slot filled by the frame parser */");
    let _ = writeln!(out, "typedef struct {{");
    let _ = writeln!(out, "    uint16_t    id;");
    let _ = writeln!(out, "    float       value;");
    let _ = writeln!(out, "    bool        valid;");
    let _ = writeln!(out, "}} sl_sensor_t;");
    let _ = writeln!(out);
    let _ = writeln!(out, "/* Sensor info table */");
    let _ = writeln!(out, "typedef struct {{");
    let _ = writeln!(out, "    uint16_t    id;");
    let _ = writeln!(out, "    const char* name;");
    let _ = writeln!(out, "    const char* unit;");
    let _ = writeln!(out, "}} sl_sensor_info_t;");
    let _ = writeln!(out);
    let _ = writeln!(out, "static const sl_sensor_info_t SL_SENSOR_INFO[] = {{");
    for (native_id, entry) in entries {
        let name = truncated(&entry.name, 30).replace('"', "'");
        let _ = writeln!(
            out,
            "    {{ {}, \"{}\", \"{}\" }},",
            names[native_id], name, entry.unit
        );
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
    let _ = writeln!(out, "/* Helpers */");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "static inline float sl_get_value(const sl_sensor_t* sensors, int count, uint16_t id) {{"
    );
    let _ = writeln!(out, "    for (int i = 0; i < count; i++) {{");
    let _ = writeln!(
        out,
        "        if (sensors[i].id == id && sensors[i].valid) return sensors[i].value;"
    );
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    return -999.0f;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "static inline const char* sl_get_name(uint16_t id) {{");
    let _ = writeln!(out, "    for (int i = 0; i < SL_SENSOR_COUNT; i++) {{");
    let _ = writeln!(
        out,
        "        if (SL_SENSOR_INFO[i].id == id) return SL_SENSOR_INFO[i].name;"
    );
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    return \"Unknown\";");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "static inline const char* sl_get_unit(uint16_t id) {{");
    let _ = writeln!(out, "    for (int i = 0; i < SL_SENSOR_COUNT; i++) {{");
    let _ = writeln!(
        out,
        "        if (SL_SENSOR_INFO[i].id == id) return SL_SENSOR_INFO[i].unit;"
    );
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "    return \"\";");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    let _ = writeln!(out, "#endif /* {}_H */", guard);

    fs::write(path, out).map_err(|e| SensorLinkError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render a terminal-friendly table of the map for operator listings.
pub fn preview(entries: &[(String, RegistryEntry)]) -> String {
    if entries.is_empty() {
        return "(no sensors mapped)".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "  ID      Name                             Kind");
    let _ = writeln!(out, "  ------  -------------------------------  ------------");
    for (_, entry) in entries.iter().take(20) {
        let _ = writeln!(
            out,
            "  0x{:04X}  {:<31}  {:?}",
            entry.id,
            truncated(&entry.name, 30),
            entry.kind
        );
    }
    if entries.len() > 20 {
        let _ = writeln!(out, "  ...     and {} more", entries.len() - 20);
    }
    let _ = writeln!(out, "Total: {} sensors", entries.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SensorKind;

    fn entry(id: u16, name: &str, hardware: &str, kind: SensorKind, unit: &str) -> RegistryEntry {
        RegistryEntry {
            id,
            name: name.to_string(),
            hardware: hardware.to_string(),
            kind,
            unit: unit.to_string(),
            first_seen: 0,
            last_seen: 0,
        }
    }

    fn sample_entries() -> Vec<(String, RegistryEntry)> {
        vec![
            (
                "cpu/0/temperature/0".to_string(),
                entry(0x0001, "Core (Tctl/Tdie)", "AMD Ryzen 7 5800X", SensorKind::Temperature, "°C"),
            ),
            (
                "gpu/0/temperature/0".to_string(),
                entry(0x0010, "GPU Core", "NVIDIA GeForce RTX 3080", SensorKind::Temperature, "°C"),
            ),
            (
                "ram/load/0".to_string(),
                entry(0x0011, "Memory", "Generic Memory", SensorKind::Load, "%"),
            ),
        ]
    }

    #[test]
    fn header_is_deterministic() {
        let dir = tempfile::TempDir::new().unwrap();
        let entries = sample_entries();

        let first_path = dir.path().join("sensor_ids.h");
        let second_path = dir.path().join("sensor_ids_again.h");
        write_header(&entries, &first_path).unwrap();
        write_header(&entries, &second_path).unwrap();

        let first = fs::read_to_string(&first_path).unwrap();
        let second = fs::read_to_string(&second_path).unwrap();
        // identical apart from the file name and include guard
        assert_eq!(
            first.replace("sensor_ids.h", "X").replace("SENSOR_IDS_H", "G"),
            second
                .replace("sensor_ids_again.h", "X")
                .replace("SENSOR_IDS_AGAIN_H", "G")
        );
    }

    #[test]
    fn header_contains_constants_and_helpers() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sensor_ids.h");
        write_header(&sample_entries(), &path).unwrap();
        let header = fs::read_to_string(&path).unwrap();

        assert!(header.contains("#define SL_PROTO_START   0xAA"));
        assert!(header.contains("#define SL_PROTO_END     0x55"));
        assert!(header.contains("#define SL_PROTO_VERSION 0x02"));
        assert!(header.contains("0x0001"));
        assert!(header.contains("/* CPU */"));
        assert!(header.contains("/* GPU */"));
        assert!(header.contains("#define SL_SENSOR_COUNT  3"));
        assert!(header.contains("sl_get_value"));
        assert!(header.contains("sl_get_name"));
        assert!(header.contains("sl_get_unit"));
        assert!(header.contains("#ifndef SENSOR_IDS_H"));
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let entries = vec![
            ("a".to_string(), entry(0x0001, "Fan", "Motherboard", SensorKind::Fan, "RPM")),
            ("b".to_string(), entry(0x0002, "Fan", "Motherboard", SensorKind::Fan, "RPM")),
        ];
        let names = unique_names(&entries);
        assert_ne!(names["a"], names["b"]);
        assert!(names["b"].ends_with("_2"));
    }

    #[test]
    fn preview_lists_ids_and_total() {
        let text = preview(&sample_entries());
        assert!(text.contains("0x0001"));
        assert!(text.contains("Total: 3 sensors"));
        assert_eq!(preview(&[]), "(no sensors mapped)");
    }
}
