use chrono::{DateTime, Local, Utc};

pub fn format_optional_datetime(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(value) => format_datetime(value),
        None => "No disponible".to_string(),
    }
}

pub fn format_datetime(time: DateTime<Utc>) -> String {
    let datetime: DateTime<Local> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} bytes", bytes)
    } else {
        format!("{value:.2} {} ({} bytes)", UNITS[unit_index], bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_uses_binary_units() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(1536), "1.50 KiB (1536 bytes)");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MiB (5242880 bytes)");
    }

    #[test]
    fn missing_datetime_is_unavailable() {
        assert_eq!(format_optional_datetime(None), "No disponible");
    }
}
