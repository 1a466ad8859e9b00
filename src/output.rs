//! Terminal renderings of a departure board.
//!
//! Supports a plain-text table and pretty JSON.

use std::io::Write;

use anyhow::Result;

use crate::departures::DepartureBoard;

/// Writes the board as an aligned text table.
pub fn write_table<W: Write>(mut out: W, board: &DepartureBoard) -> Result<()> {
    writeln!(out, "{}", board.stop_display_name)?;

    if board.departures.is_empty() {
        writeln!(out, "  no upcoming departures")?;
        return Ok(());
    }

    let route_width = board
        .departures
        .iter()
        .map(|d| d.route.chars().count())
        .max()
        .unwrap_or(0)
        .max("Route".len());

    writeln!(out, "  Time   {:<route_width$}  Platform", "Route")?;
    for d in &board.departures {
        writeln!(out, "  {}  {:<route_width$}  {}", d.time, d.route, d.platform)?;
    }
    Ok(())
}

/// Writes the board as pretty-printed JSON, in the HTTP response shape.
pub fn write_json<W: Write>(mut out: W, board: &DepartureBoard) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, board)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::departures::Departure;

    fn board() -> DepartureBoard {
        DepartureBoard {
            stop_display_name: "Central Station platform 2".to_string(),
            departures: vec![
                Departure {
                    route: "42".to_string(),
                    time: "08:07".to_string(),
                    platform: "2".to_string(),
                },
                Departure {
                    route: "Airport Express".to_string(),
                    time: "08:15".to_string(),
                    platform: "?".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_write_table() {
        let mut buf = Vec::new();
        write_table(&mut buf, &board()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Central Station platform 2",
                "  Time   Route            Platform",
                "  08:07  42               2",
                "  08:15  Airport Express  ?",
            ]
        );
    }

    #[test]
    fn test_write_table_empty() {
        let mut buf = Vec::new();
        let empty = DepartureBoard {
            stop_display_name: "Central".to_string(),
            departures: vec![],
        };
        write_table(&mut buf, &empty).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Central\n  no upcoming departures\n"
        );
    }

    #[test]
    fn test_write_json_round_trips_shape() {
        let mut buf = Vec::new();
        write_json(&mut buf, &board()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["stopDisplayName"], "Central Station platform 2");
        assert_eq!(value["departures"][1]["route"], "Airport Express");
        assert_eq!(value["departures"][1]["platform"], "?");
    }
}
