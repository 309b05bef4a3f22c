//! Double-precision instructions.
//!
//! A double occupies a register component pair, `xy` or `zw`, low word first.

use super::expr::{apply_modifier, combine, NumType};
use super::inst::compare_expr;
use super::{Emitter, Result};
use crate::glsl::version::GlslRules;
use crate::sm4::opcode::Opcode;
use crate::sm4_ir::{Instruction, Operand, WriteMask};

/// Component pairs written by `mask`.
fn pairs(mask: WriteMask) -> Vec<u8> {
    (0..2).filter(|p| mask.0 & (0b11 << (2 * p)) != 0).collect()
}

fn pair_mask(p: u8) -> WriteMask {
    WriteMask(0b11 << (2 * p))
}

impl Emitter<'_> {
    /// Double `k` of `op`: swizzle lanes `2k` and `2k + 1`.
    fn read_double(&self, op: &Operand, k: u8) -> Result<String> {
        let swizzle = op.swizzle();
        let comps = [swizzle.lane(2 * k), swizzle.lane(2 * k + 1)]
            .into_iter()
            .map(|c| self.component(op, c))
            .collect::<Result<Vec<_>>>()?;
        let bits = combine(&comps, NumType::Uint);
        Ok(apply_modifier(format!("packDouble2x32({bits})"), op.modifier, NumType::Float))
    }

    fn store_double(&mut self, inst: &Instruction, p: u8, value: String) -> Result<()> {
        let value = if inst.saturate {
            format!("clamp({value}, 0.0LF, 1.0LF)")
        } else {
            value
        };
        let dst = self.dst(inst, 0)?;
        self.store_masked(dst, pair_mask(p), format!("unpackDouble2x32({value})"), NumType::Uint)
    }

    pub(super) fn double(&mut self, inst: &Instruction) -> Result<()> {
        self.require(GlslRules::DOUBLES, "double precision")?;
        let mask = self.dst(inst, 0)?.mask();
        match inst.opcode {
            Opcode::Dadd | Opcode::Dmul | Opcode::Dmax | Opcode::Dmin => {
                for p in pairs(mask) {
                    let a = self.read_double(self.src(inst, 0)?, p)?;
                    let b = self.read_double(self.src(inst, 1)?, p)?;
                    let value = match inst.opcode {
                        Opcode::Dadd => format!("{a} + {b}"),
                        Opcode::Dmul => format!("{a} * {b}"),
                        Opcode::Dmax => format!("max({a}, {b})"),
                        _ => format!("min({a}, {b})"),
                    };
                    self.store_double(inst, p, value)?;
                }
            }
            Opcode::Dmov => {
                for p in pairs(mask) {
                    let a = self.read_double(self.src(inst, 0)?, p)?;
                    self.store_double(inst, p, a)?;
                }
            }
            Opcode::Dmovc => {
                for p in pairs(mask) {
                    let cond = self.read_lane(self.src(inst, 0)?, 2 * p, NumType::Uint)?;
                    let a = self.read_double(self.src(inst, 1)?, p)?;
                    let b = self.read_double(self.src(inst, 2)?, p)?;
                    self.store_double(inst, p, format!("{cond} != 0u ? {a} : {b}"))?;
                }
            }
            Opcode::Deq | Opcode::Dge | Opcode::Dlt | Opcode::Dne => {
                let op = match inst.opcode {
                    Opcode::Deq => "==",
                    Opcode::Dge => ">=",
                    Opcode::Dlt => "<",
                    _ => "!=",
                };
                let dst = self.dst(inst, 0)?;
                for (k, c) in mask.components().enumerate() {
                    let a = self.read_double(self.src(inst, 0)?, k as u8)?;
                    let b = self.read_double(self.src(inst, 1)?, k as u8)?;
                    self.store_masked(dst, WriteMask(1 << c), compare_expr(&a, op, &b, 1), NumType::Uint)?;
                }
            }
            Opcode::Dtof => {
                let dst = self.dst(inst, 0)?;
                for (k, c) in mask.components().enumerate() {
                    let a = self.read_double(self.src(inst, 0)?, k as u8)?;
                    self.store_masked(dst, WriteMask(1 << c), format!("float({a})"), NumType::Float)?;
                }
            }
            Opcode::Ftod => {
                for (k, p) in pairs(mask).into_iter().enumerate() {
                    let a = self.read_lane(self.src(inst, 0)?, k as u8, NumType::Float)?;
                    self.store_double(inst, p, format!("double({a})"))?;
                }
            }
            _ => return Err(self.unsupported()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_split_into_pairs() {
        assert_eq!(pairs(WriteMask(0b0011)), vec![0]);
        assert_eq!(pairs(WriteMask(0b1100)), vec![1]);
        assert_eq!(pairs(WriteMask(0b1111)), vec![0, 1]);
        assert_eq!(pair_mask(1), WriteMask(0b1100));
    }
}
