use chrono::{DateTime, Local, Utc};

pub fn unit_prefix(unit_multiplier: i16) -> &'static str {
    match unit_multiplier {
        -12 => "p",
        -9 => "n",
        -6 => "u",
        -3 => "m",
        0 => "",
        3 => "k",
        6 => "M",
        9 => "G",
        _ => "?",
    }
}

pub fn pretty_ts(&ts: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = ts.into();
    local.format("%H:%M:%S%.3f").to_string()
}
