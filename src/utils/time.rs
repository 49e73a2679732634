use chrono::{DateTime, Utc};

/// 相对时间描述（意大利语），例如 "3 minuti fa"
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds().max(0);

    if seconds < 30 {
        return "meno di un minuto fa".to_string();
    }

    let minutes = (seconds + 30) / 60;
    if minutes <= 1 {
        return "1 minuto fa".to_string();
    }
    if minutes < 45 {
        return format!("{} minuti fa", minutes);
    }
    if minutes < 90 {
        return "circa 1 ora fa".to_string();
    }

    let hours = (minutes + 30) / 60;
    if hours < 24 {
        return format!("circa {} ore fa", hours);
    }
    if hours < 42 {
        return "1 giorno fa".to_string();
    }

    let days = (hours + 12) / 24;
    if days < 30 {
        return format!("{} giorni fa", days);
    }
    if days < 45 {
        return "circa 1 mese fa".to_string();
    }
    if days < 365 {
        let months = ((days + 15) / 30).max(2);
        return format!("{} mesi fa", months);
    }

    match days / 365 {
        1 => "circa 1 anno fa".to_string(),
        years => format!("circa {} anni fa", years),
    }
}
