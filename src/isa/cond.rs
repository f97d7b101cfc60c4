//! Condition codes and their evaluation against PSTATE (NZCV).

use crate::cpu::pstate::PState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq = 0,
    Ne = 1,
    CsHs = 2,
    CcLo = 3,
    Mi = 4,
    Pl = 5,
    Vs = 6,
    Vc = 7,
    Hi = 8,
    Ls = 9,
    Ge = 10,
    Lt = 11,
    Gt = 12,
    Le = 13,
    Al = 14,
    Nv = 15,
}

impl Cond {
    pub fn from_u32(v: u32) -> Self {
        match v & 0xF {
            0 => Cond::Eq,
            1 => Cond::Ne,
            2 => Cond::CsHs,
            3 => Cond::CcLo,
            4 => Cond::Mi,
            5 => Cond::Pl,
            6 => Cond::Vs,
            7 => Cond::Vc,
            8 => Cond::Hi,
            9 => Cond::Ls,
            10 => Cond::Ge,
            11 => Cond::Lt,
            12 => Cond::Gt,
            13 => Cond::Le,
            14 => Cond::Al,
            _ => Cond::Nv,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::CsHs => "hs",
            Cond::CcLo => "lo",
            Cond::Mi => "mi",
            Cond::Pl => "pl",
            Cond::Vs => "vs",
            Cond::Vc => "vc",
            Cond::Hi => "hi",
            Cond::Ls => "ls",
            Cond::Ge => "ge",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Al => "al",
            Cond::Nv => "nv",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Cond::Eq),
            "ne" => Some(Cond::Ne),
            "cs" | "hs" => Some(Cond::CsHs),
            "cc" | "lo" => Some(Cond::CcLo),
            "mi" => Some(Cond::Mi),
            "pl" => Some(Cond::Pl),
            "vs" => Some(Cond::Vs),
            "vc" => Some(Cond::Vc),
            "hi" => Some(Cond::Hi),
            "ls" => Some(Cond::Ls),
            "ge" => Some(Cond::Ge),
            "lt" => Some(Cond::Lt),
            "gt" => Some(Cond::Gt),
            "le" => Some(Cond::Le),
            "al" => Some(Cond::Al),
            "nv" => Some(Cond::Nv),
            _ => None,
        }
    }

    /// Evaluates this condition against the current NZCV flags.
    pub fn eval(self, p: &PState) -> bool {
        match self {
            Cond::Eq => p.z,
            Cond::Ne => !p.z,
            Cond::CsHs => p.c,
            Cond::CcLo => !p.c,
            Cond::Mi => p.n,
            Cond::Pl => !p.n,
            Cond::Vs => p.v,
            Cond::Vc => !p.v,
            Cond::Hi => p.c && !p.z,
            Cond::Ls => !p.c || p.z,
            Cond::Ge => p.n == p.v,
            Cond::Lt => p.n != p.v,
            Cond::Gt => !p.z && (p.n == p.v),
            Cond::Le => p.z || (p.n != p.v),
            Cond::Al => true,
            Cond::Nv => false,
        }
    }
}
