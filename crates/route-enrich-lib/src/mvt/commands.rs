//! Vector tile geometry command decoding

use super::wire::zigzag_decode;
use geo::Coord;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// An ordered list of tile-local integer coordinates
pub type Ring = Vec<Coord<i32>>;

/// Decode a command-encoded geometry into rings
///
/// Each command word packs the command id in its low 3 bits and a repeat count in the
/// remaining bits. `MoveTo` starts a new ring, `LineTo` extends the current one and
/// `ClosePath` ends it. Operands are zigzag-encoded deltas added to a cursor that
/// persists for the whole feature. Decoding stops at the first unknown command or when
/// the operands run out, keeping the rings decoded so far. A final operand pair that lacks
/// its dy still yields a point, with dy taken as 0.
pub fn decode_geometry(commands: &[u32]) -> Vec<Ring> {
    let mut rings = Vec::new();
    let mut ring: Ring = Vec::new();
    let mut cursor = Coord { x: 0i32, y: 0i32 };
    let mut i = 0;

    'commands: while i < commands.len() {
        let command = commands[i] & 0x7;
        let count = commands[i] >> 3;
        i += 1;

        match command {
            CMD_MOVE_TO | CMD_LINE_TO => {
                for _ in 0..count {
                    let Some(&dx) = commands.get(i) else {
                        tracing::debug!("Geometry ends before operand {}", i);
                        break 'commands;
                    };
                    // A missing trailing dy counts as 0
                    let dy = commands.get(i + 1).copied().unwrap_or(0);
                    cursor.x = cursor.x.wrapping_add(zigzag_decode(dx));
                    cursor.y = cursor.y.wrapping_add(zigzag_decode(dy));
                    i += 2;

                    if command == CMD_MOVE_TO && !ring.is_empty() {
                        rings.push(std::mem::take(&mut ring));
                    }
                    ring.push(cursor);
                }
            }
            CMD_CLOSE_PATH => {
                if !ring.is_empty() {
                    rings.push(std::mem::take(&mut ring));
                }
            }
            other => {
                tracing::debug!("Unknown geometry command {} at index {}", other, i - 1);
                break;
            }
        }
    }

    if !ring.is_empty() {
        rings.push(ring);
    }

    rings
}

/// Pack a command id and repeat count into a command word
#[inline]
pub fn command_word(id: u32, count: u32) -> u32 {
    (count << 3) | (id & 0x7)
}

#[cfg(test)]
mod tests {
    use super::super::wire::zigzag_encode;
    use super::*;

    fn params(values: &[i32]) -> Vec<u32> {
        values.iter().map(|&v| zigzag_encode(v)).collect()
    }

    #[test]
    fn test_move_line_close_accumulates_deltas() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[1, 1]));
        geometry.push(command_word(CMD_LINE_TO, 1));
        geometry.extend(params(&[2, 2]));
        geometry.push(command_word(CMD_CLOSE_PATH, 1));

        let rings = decode_geometry(&geometry);
        assert_eq!(rings, vec![vec![Coord { x: 1, y: 1 }, Coord { x: 3, y: 3 }]]);
    }

    #[test]
    fn test_line_to_repeat_count() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[10, 10]));
        geometry.push(command_word(CMD_LINE_TO, 3));
        geometry.extend(params(&[5, 0, 0, 5, -5, 0]));

        let rings = decode_geometry(&geometry);
        assert_eq!(rings.len(), 1);
        assert_eq!(
            rings[0],
            vec![
                Coord { x: 10, y: 10 },
                Coord { x: 15, y: 10 },
                Coord { x: 15, y: 15 },
                Coord { x: 10, y: 15 },
            ]
        );
    }

    #[test]
    fn test_cursor_persists_across_rings() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[1, 1]));
        geometry.push(command_word(CMD_LINE_TO, 1));
        geometry.extend(params(&[1, 0]));
        geometry.push(command_word(CMD_MOVE_TO, 1));
        geometry.extend(params(&[10, 10]));
        geometry.push(command_word(CMD_LINE_TO, 1));
        geometry.extend(params(&[0, -1]));

        let rings = decode_geometry(&geometry);
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1], vec![Coord { x: 12, y: 11 }, Coord { x: 12, y: 10 }]);
    }

    #[test]
    fn test_missing_trailing_dy_is_zero() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[4, 4]));
        geometry.push(command_word(CMD_LINE_TO, 2));
        geometry.extend(params(&[1, 1, 7]));

        let rings = decode_geometry(&geometry);
        assert_eq!(
            rings,
            vec![vec![
                Coord { x: 4, y: 4 },
                Coord { x: 5, y: 5 },
                Coord { x: 12, y: 5 },
            ]]
        );
    }

    #[test]
    fn test_repeat_count_past_operands_keeps_prefix() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[4, 4]));
        geometry.push(command_word(CMD_LINE_TO, 3));
        geometry.extend(params(&[1, 1]));

        let rings = decode_geometry(&geometry);
        assert_eq!(rings, vec![vec![Coord { x: 4, y: 4 }, Coord { x: 5, y: 5 }]]);
    }

    #[test]
    fn test_unknown_command_stops() {
        let mut geometry = vec![command_word(CMD_MOVE_TO, 1)];
        geometry.extend(params(&[2, 3]));
        geometry.push(command_word(4, 1));
        geometry.extend(params(&[9, 9]));

        let rings = decode_geometry(&geometry);
        assert_eq!(rings, vec![vec![Coord { x: 2, y: 3 }]]);
    }

    #[test]
    fn test_empty_geometry() {
        assert!(decode_geometry(&[]).is_empty());
        assert!(decode_geometry(&[command_word(CMD_CLOSE_PATH, 1)]).is_empty());
    }
}
