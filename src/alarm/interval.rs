use super::AlarmError;

/// Parse an interval typed by the user into seconds.
///
/// A bare number is minutes (`20`, `0.5`). Units can be spelled out with
/// `h`, `m` and `s` and combined: `90s`, `1h30m`, `1.5h`, `2m 30s`.
pub fn parse_interval(text: &str) -> Result<f64, AlarmError> {
    let invalid = || AlarmError::InvalidInterval(text.trim().to_string());
    let input = text.trim().to_lowercase();
    if input.is_empty() {
        return Err(invalid());
    }

    let seconds = if let Ok(minutes) = input.parse::<f64>() {
        minutes * 60.0
    } else {
        let mut total = 0.0;
        let mut number = String::new();
        for ch in input.chars() {
            match ch {
                '0'..='9' | '.' => number.push(ch),
                'h' | 'm' | 's' => {
                    let value: f64 = number.parse().map_err(|_| invalid())?;
                    number.clear();
                    total += match ch {
                        'h' => value * 3600.0,
                        'm' => value * 60.0,
                        _ => value,
                    };
                }
                c if c.is_whitespace() => {
                    if !number.is_empty() {
                        return Err(invalid());
                    }
                }
                _ => return Err(invalid()),
            }
        }
        // Trailing digits without a unit
        if !number.is_empty() {
            return Err(invalid());
        }
        total
    };

    // Same limits the clock applies, so a parsed interval always starts
    match super::interval_duration(seconds) {
        Ok(_) => Ok(seconds),
        Err(_) => Err(invalid()),
    }
}
