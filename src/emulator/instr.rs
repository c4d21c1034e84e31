//! Decodificação das instruções MIPS III do VR4300.
//!
//! `Instruction::decode` is total: every 32-bit word decodes to something.
//! Encodings the VR4300 doesn't implement become `RESERVED`. Coprocessor
//! opcodes with no instruction behind them, COP2/COP3 included, become
//! `COP` so the pipeline checks the CU bit before raising the matching
//! fault. The decoder never fails.

use super::{FloatRegister, Register};

/// Sign extends the low `bits` bits of `value` to 64 bits.
pub fn sign_extend(value: u64, bits: u32) -> u64 {
    let shift = 64 - bits;
    (((value << shift) as i64) >> shift) as u64
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RArgs {
    pub rs: Register,
    pub rt: Register,
    pub rd: Register,
    pub shamt: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IArgs {
    pub rs: Register,
    pub rt: Register,
    pub imm: u16,
}

impl IArgs {
    /// The immediate, sign extended.
    pub fn simm(&self) -> u64 {
        sign_extend(self.imm as u64, 16)
    }

    /// Branch displacement in bytes, relative to the delay slot.
    pub fn offset(&self) -> u32 {
        (self.simm() << 2) as u32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JArgs {
    /// The 26-bit instruction index.
    pub target: u32,
}

/// The `fmt` field of COP1 arithmetic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    S,
    D,
    W,
    L,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Format::S => "S",
            Format::D => "D",
            Format::W => "W",
            Format::L => "L",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FRArgs {
    pub fmt: Format,
    pub ft: FloatRegister,
    pub fs: FloatRegister,
    pub fd: FloatRegister,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FIArgs {
    pub base: Register,
    pub ft: FloatRegister,
    pub imm: u16,
}

impl FIArgs {
    pub fn simm(&self) -> u64 {
        sign_extend(self.imm as u64, 16)
    }
}

/// Moves between a GPR and a coprocessor register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CopArgs {
    pub rt: Register,
    /// Coprocessor register number.
    pub rd: u32,
}

/// A set of GPRs, one bit per register. `$zero` is never in a set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegSet(u32);

impl RegSet {
    pub fn empty() -> RegSet {
        RegSet(0)
    }

    pub fn with(self, reg: Register) -> RegSet {
        RegSet(self.0 | (1 << reg.0) & !1)
    }

    pub fn contains(&self, reg: Register) -> bool {
        reg.0 != 0 && self.0 & (1 << reg.0) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    NOP,

    // SPECIAL
    SLL(RArgs),
    SRL(RArgs),
    SRA(RArgs),
    SLLV(RArgs),
    SRLV(RArgs),
    SRAV(RArgs),
    JR(RArgs),
    JALR(RArgs),
    SYSCALL,
    BREAK,
    SYNC,
    MFHI(RArgs),
    MTHI(RArgs),
    MFLO(RArgs),
    MTLO(RArgs),
    DSLLV(RArgs),
    DSRLV(RArgs),
    DSRAV(RArgs),
    MULT(RArgs),
    MULTU(RArgs),
    DIV(RArgs),
    DIVU(RArgs),
    DMULT(RArgs),
    DMULTU(RArgs),
    DDIV(RArgs),
    DDIVU(RArgs),
    ADD(RArgs),
    ADDU(RArgs),
    SUB(RArgs),
    SUBU(RArgs),
    AND(RArgs),
    OR(RArgs),
    XOR(RArgs),
    NOR(RArgs),
    SLT(RArgs),
    SLTU(RArgs),
    DADD(RArgs),
    DADDU(RArgs),
    DSUB(RArgs),
    DSUBU(RArgs),
    TGE(RArgs),
    TGEU(RArgs),
    TLT(RArgs),
    TLTU(RArgs),
    TEQ(RArgs),
    TNE(RArgs),
    DSLL(RArgs),
    DSRL(RArgs),
    DSRA(RArgs),
    DSLL32(RArgs),
    DSRL32(RArgs),
    DSRA32(RArgs),

    // REGIMM
    BLTZ(IArgs),
    BGEZ(IArgs),
    BLTZL(IArgs),
    BGEZL(IArgs),
    TGEI(IArgs),
    TGEIU(IArgs),
    TLTI(IArgs),
    TLTIU(IArgs),
    TEQI(IArgs),
    TNEI(IArgs),
    BLTZAL(IArgs),
    BGEZAL(IArgs),
    BLTZALL(IArgs),
    BGEZALL(IArgs),

    J(JArgs),
    JAL(JArgs),

    BEQ(IArgs),
    BNE(IArgs),
    BLEZ(IArgs),
    BGTZ(IArgs),
    BEQL(IArgs),
    BNEL(IArgs),
    BLEZL(IArgs),
    BGTZL(IArgs),

    ADDI(IArgs),
    ADDIU(IArgs),
    SLTI(IArgs),
    SLTIU(IArgs),
    ANDI(IArgs),
    ORI(IArgs),
    XORI(IArgs),
    LUI(IArgs),
    DADDI(IArgs),
    DADDIU(IArgs),

    LB(IArgs),
    LBU(IArgs),
    LH(IArgs),
    LHU(IArgs),
    LW(IArgs),
    LWU(IArgs),
    LWL(IArgs),
    LWR(IArgs),
    LD(IArgs),
    LDL(IArgs),
    LDR(IArgs),
    LL(IArgs),
    LLD(IArgs),
    SB(IArgs),
    SH(IArgs),
    SW(IArgs),
    SWL(IArgs),
    SWR(IArgs),
    SD(IArgs),
    SDL(IArgs),
    SDR(IArgs),
    SC(IArgs),
    SCD(IArgs),
    CACHE(IArgs),

    // COP0
    MFC0(CopArgs),
    DMFC0(CopArgs),
    MTC0(CopArgs),
    DMTC0(CopArgs),
    TLBR,
    TLBWI,
    TLBWR,
    TLBP,
    ERET,

    // COP1
    MFC1(CopArgs),
    DMFC1(CopArgs),
    CFC1(CopArgs),
    MTC1(CopArgs),
    DMTC1(CopArgs),
    CTC1(CopArgs),
    BC1F(IArgs),
    BC1T(IArgs),
    BC1FL(IArgs),
    BC1TL(IArgs),
    LWC1(FIArgs),
    LDC1(FIArgs),
    SWC1(FIArgs),
    SDC1(FIArgs),
    FADD(FRArgs),
    FSUB(FRArgs),
    FMUL(FRArgs),
    FDIV(FRArgs),
    FSQRT(FRArgs),
    FABS(FRArgs),
    FMOV(FRArgs),
    FNEG(FRArgs),
    ROUND_L(FRArgs),
    TRUNC_L(FRArgs),
    CEIL_L(FRArgs),
    FLOOR_L(FRArgs),
    ROUND_W(FRArgs),
    TRUNC_W(FRArgs),
    CEIL_W(FRArgs),
    FLOOR_W(FRArgs),
    CVT_S(FRArgs),
    CVT_D(FRArgs),
    CVT_W(FRArgs),
    CVT_L(FRArgs),
    /// C.cond.fmt, the predicate in the low 4 bits.
    C(FRArgs, u8),

    /// A coprocessor opcode with nothing assigned to it. Always the case
    /// for COP2 and COP3, which the VR4300 doesn't have.
    COP { unit: u8, word: u32 },
    RESERVED(u32),
}

const CONDITIONS: [&str; 16] = [
    "F", "UN", "EQ", "UEQ", "OLT", "ULT", "OLE", "ULE", "SF", "NGLE", "SEQ", "NGL", "LT", "NGE",
    "LE", "NGT",
];

impl Instruction {
    pub fn decode(word: u32) -> Instruction {
        if word == 0 {
            return Instruction::NOP;
        }

        let opcode = word >> 26;

        match opcode {
            0x00 => decode_r_instr(word),
            0x01 => decode_regimm(word),
            0x02 | 0x03 => decode_j_instr(word),
            0x10 => decode_cop0(word),
            0x11 => decode_cop1(word),
            0x12 => Instruction::COP { unit: 2, word },
            0x13 => Instruction::COP { unit: 3, word },
            // LWC2, LDC2, SWC2, SDC2
            0x32 | 0x36 | 0x3a | 0x3e => Instruction::COP { unit: 2, word },
            _ => decode_i_instr(word),
        }
    }

    pub fn is_branch(&self) -> bool {
        use Instruction::*;

        matches!(
            self,
            J(_) | JAL(_)
                | JR(_)
                | JALR(_)
                | BEQ(_)
                | BNE(_)
                | BLEZ(_)
                | BGTZ(_)
                | BEQL(_)
                | BNEL(_)
                | BLEZL(_)
                | BGTZL(_)
                | BLTZ(_)
                | BGEZ(_)
                | BLTZL(_)
                | BGEZL(_)
                | BLTZAL(_)
                | BGEZAL(_)
                | BLTZALL(_)
                | BGEZALL(_)
                | BC1F(_)
                | BC1T(_)
                | BC1FL(_)
                | BC1TL(_)
        )
    }

    /// Whether this is a branch-likely: the delay slot is nullified when
    /// the branch isn't taken.
    pub fn is_likely(&self) -> bool {
        use Instruction::*;

        matches!(
            self,
            BEQL(_) | BNEL(_) | BLEZL(_) | BGTZL(_) | BLTZL(_) | BGEZL(_) | BLTZALL(_)
                | BGEZALL(_) | BC1FL(_) | BC1TL(_)
        )
    }

    /// Access size in bytes of loads and stores, GPR and FPU alike.
    pub fn memory_width(&self) -> Option<u32> {
        use Instruction::*;

        match self {
            LB(_) | LBU(_) | SB(_) => Some(1),
            LH(_) | LHU(_) | SH(_) => Some(2),
            LW(_) | LWU(_) | LWL(_) | LWR(_) | LL(_) | SW(_) | SWL(_) | SWR(_) | SC(_)
            | LWC1(_) | SWC1(_) => Some(4),
            LD(_) | LDL(_) | LDR(_) | LLD(_) | SD(_) | SDL(_) | SDR(_) | SCD(_) | LDC1(_)
            | SDC1(_) => Some(8),
            _ => None,
        }
    }

    pub fn is_load(&self) -> bool {
        use Instruction::*;

        matches!(
            self,
            LB(_) | LBU(_) | LH(_) | LHU(_) | LW(_) | LWU(_) | LWL(_) | LWR(_) | LD(_) | LDL(_)
                | LDR(_) | LL(_) | LLD(_) | LWC1(_) | LDC1(_)
        )
    }

    pub fn is_store(&self) -> bool {
        self.memory_width().is_some() && !self.is_load()
    }

    /// Payload of the COP1 arithmetic, conversion and compare forms.
    pub fn fpu_args(&self) -> Option<&FRArgs> {
        use Instruction::*;

        match self {
            FADD(a) | FSUB(a) | FMUL(a) | FDIV(a) | FSQRT(a) | FABS(a) | FMOV(a) | FNEG(a)
            | ROUND_L(a) | TRUNC_L(a) | CEIL_L(a) | FLOOR_L(a) | ROUND_W(a) | TRUNC_W(a)
            | CEIL_W(a) | FLOOR_W(a) | CVT_S(a) | CVT_D(a) | CVT_W(a) | CVT_L(a) | C(a, _) => {
                Some(a)
            }
            _ => None,
        }
    }

    /// GPRs read by the instruction.
    pub fn reads(&self) -> RegSet {
        use Instruction::*;

        let set = RegSet::empty();
        match self {
            SLL(a) | SRL(a) | SRA(a) | DSLL(a) | DSRL(a) | DSRA(a) | DSLL32(a) | DSRL32(a)
            | DSRA32(a) => set.with(a.rt),
            JR(a) | JALR(a) | MTHI(a) | MTLO(a) => set.with(a.rs),
            SLLV(a) | SRLV(a) | SRAV(a) | DSLLV(a) | DSRLV(a) | DSRAV(a) | MULT(a) | MULTU(a)
            | DIV(a) | DIVU(a) | DMULT(a) | DMULTU(a) | DDIV(a) | DDIVU(a) | ADD(a) | ADDU(a)
            | SUB(a) | SUBU(a) | AND(a) | OR(a) | XOR(a) | NOR(a) | SLT(a) | SLTU(a)
            | DADD(a) | DADDU(a) | DSUB(a) | DSUBU(a) | TGE(a) | TGEU(a) | TLT(a) | TLTU(a)
            | TEQ(a) | TNE(a) => set.with(a.rs).with(a.rt),

            BLTZ(a) | BGEZ(a) | BLTZL(a) | BGEZL(a) | TGEI(a) | TGEIU(a) | TLTI(a)
            | TLTIU(a) | TEQI(a) | TNEI(a) | BLTZAL(a) | BGEZAL(a) | BLTZALL(a)
            | BGEZALL(a) | BLEZ(a) | BGTZ(a) | BLEZL(a) | BGTZL(a) => set.with(a.rs),
            BEQ(a) | BNE(a) | BEQL(a) | BNEL(a) => set.with(a.rs).with(a.rt),

            ADDI(a) | ADDIU(a) | SLTI(a) | SLTIU(a) | ANDI(a) | ORI(a) | XORI(a) | DADDI(a)
            | DADDIU(a) => set.with(a.rs),

            LB(a) | LBU(a) | LH(a) | LHU(a) | LW(a) | LWU(a) | LD(a) | LL(a) | LLD(a)
            | CACHE(a) => set.with(a.rs),
            // partial loads merge into the old value
            LWL(a) | LWR(a) | LDL(a) | LDR(a) => set.with(a.rs).with(a.rt),
            SB(a) | SH(a) | SW(a) | SWL(a) | SWR(a) | SD(a) | SDL(a) | SDR(a) | SC(a)
            | SCD(a) => set.with(a.rs).with(a.rt),

            LWC1(a) | LDC1(a) | SWC1(a) | SDC1(a) => set.with(a.base),
            MTC0(a) | DMTC0(a) | MTC1(a) | DMTC1(a) | CTC1(a) => set.with(a.rt),
            _ => set,
        }
    }

    /// GPRs written by the instruction.
    pub fn writes(&self) -> RegSet {
        use Instruction::*;

        let set = RegSet::empty();
        match self {
            SLL(a) | SRL(a) | SRA(a) | SLLV(a) | SRLV(a) | SRAV(a) | JALR(a) | MFHI(a)
            | MFLO(a) | DSLLV(a) | DSRLV(a) | DSRAV(a) | ADD(a) | ADDU(a) | SUB(a)
            | SUBU(a) | AND(a) | OR(a) | XOR(a) | NOR(a) | SLT(a) | SLTU(a) | DADD(a)
            | DADDU(a) | DSUB(a) | DSUBU(a) | DSLL(a) | DSRL(a) | DSRA(a) | DSLL32(a)
            | DSRL32(a) | DSRA32(a) => set.with(a.rd),

            BLTZAL(_) | BGEZAL(_) | BLTZALL(_) | BGEZALL(_) | JAL(_) => set.with(Register::RA),

            ADDI(a) | ADDIU(a) | SLTI(a) | SLTIU(a) | ANDI(a) | ORI(a) | XORI(a) | LUI(a)
            | DADDI(a) | DADDIU(a) | LB(a) | LBU(a) | LH(a) | LHU(a) | LW(a) | LWU(a)
            | LWL(a) | LWR(a) | LD(a) | LDL(a) | LDR(a) | LL(a) | LLD(a) | SC(a) | SCD(a) => {
                set.with(a.rt)
            }

            MFC0(a) | DMFC0(a) | MFC1(a) | DMFC1(a) | CFC1(a) => set.with(a.rt),
            _ => set,
        }
    }

    fn mnemonic(&self) -> &'static str {
        use Instruction::*;

        match self {
            NOP => "NOP",
            SLL(_) => "SLL",
            SRL(_) => "SRL",
            SRA(_) => "SRA",
            SLLV(_) => "SLLV",
            SRLV(_) => "SRLV",
            SRAV(_) => "SRAV",
            JR(_) => "JR",
            JALR(_) => "JALR",
            SYSCALL => "SYSCALL",
            BREAK => "BREAK",
            SYNC => "SYNC",
            MFHI(_) => "MFHI",
            MTHI(_) => "MTHI",
            MFLO(_) => "MFLO",
            MTLO(_) => "MTLO",
            DSLLV(_) => "DSLLV",
            DSRLV(_) => "DSRLV",
            DSRAV(_) => "DSRAV",
            MULT(_) => "MULT",
            MULTU(_) => "MULTU",
            DIV(_) => "DIV",
            DIVU(_) => "DIVU",
            DMULT(_) => "DMULT",
            DMULTU(_) => "DMULTU",
            DDIV(_) => "DDIV",
            DDIVU(_) => "DDIVU",
            ADD(_) => "ADD",
            ADDU(_) => "ADDU",
            SUB(_) => "SUB",
            SUBU(_) => "SUBU",
            AND(_) => "AND",
            OR(_) => "OR",
            XOR(_) => "XOR",
            NOR(_) => "NOR",
            SLT(_) => "SLT",
            SLTU(_) => "SLTU",
            DADD(_) => "DADD",
            DADDU(_) => "DADDU",
            DSUB(_) => "DSUB",
            DSUBU(_) => "DSUBU",
            TGE(_) => "TGE",
            TGEU(_) => "TGEU",
            TLT(_) => "TLT",
            TLTU(_) => "TLTU",
            TEQ(_) => "TEQ",
            TNE(_) => "TNE",
            DSLL(_) => "DSLL",
            DSRL(_) => "DSRL",
            DSRA(_) => "DSRA",
            DSLL32(_) => "DSLL32",
            DSRL32(_) => "DSRL32",
            DSRA32(_) => "DSRA32",
            BLTZ(_) => "BLTZ",
            BGEZ(_) => "BGEZ",
            BLTZL(_) => "BLTZL",
            BGEZL(_) => "BGEZL",
            TGEI(_) => "TGEI",
            TGEIU(_) => "TGEIU",
            TLTI(_) => "TLTI",
            TLTIU(_) => "TLTIU",
            TEQI(_) => "TEQI",
            TNEI(_) => "TNEI",
            BLTZAL(_) => "BLTZAL",
            BGEZAL(_) => "BGEZAL",
            BLTZALL(_) => "BLTZALL",
            BGEZALL(_) => "BGEZALL",
            J(_) => "J",
            JAL(_) => "JAL",
            BEQ(_) => "BEQ",
            BNE(_) => "BNE",
            BLEZ(_) => "BLEZ",
            BGTZ(_) => "BGTZ",
            BEQL(_) => "BEQL",
            BNEL(_) => "BNEL",
            BLEZL(_) => "BLEZL",
            BGTZL(_) => "BGTZL",
            ADDI(_) => "ADDI",
            ADDIU(_) => "ADDIU",
            SLTI(_) => "SLTI",
            SLTIU(_) => "SLTIU",
            ANDI(_) => "ANDI",
            ORI(_) => "ORI",
            XORI(_) => "XORI",
            LUI(_) => "LUI",
            DADDI(_) => "DADDI",
            DADDIU(_) => "DADDIU",
            LB(_) => "LB",
            LBU(_) => "LBU",
            LH(_) => "LH",
            LHU(_) => "LHU",
            LW(_) => "LW",
            LWU(_) => "LWU",
            LWL(_) => "LWL",
            LWR(_) => "LWR",
            LD(_) => "LD",
            LDL(_) => "LDL",
            LDR(_) => "LDR",
            LL(_) => "LL",
            LLD(_) => "LLD",
            SB(_) => "SB",
            SH(_) => "SH",
            SW(_) => "SW",
            SWL(_) => "SWL",
            SWR(_) => "SWR",
            SD(_) => "SD",
            SDL(_) => "SDL",
            SDR(_) => "SDR",
            SC(_) => "SC",
            SCD(_) => "SCD",
            CACHE(_) => "CACHE",
            MFC0(_) => "MFC0",
            DMFC0(_) => "DMFC0",
            MTC0(_) => "MTC0",
            DMTC0(_) => "DMTC0",
            TLBR => "TLBR",
            TLBWI => "TLBWI",
            TLBWR => "TLBWR",
            TLBP => "TLBP",
            ERET => "ERET",
            MFC1(_) => "MFC1",
            DMFC1(_) => "DMFC1",
            CFC1(_) => "CFC1",
            MTC1(_) => "MTC1",
            DMTC1(_) => "DMTC1",
            CTC1(_) => "CTC1",
            BC1F(_) => "BC1F",
            BC1T(_) => "BC1T",
            BC1FL(_) => "BC1FL",
            BC1TL(_) => "BC1TL",
            LWC1(_) => "LWC1",
            LDC1(_) => "LDC1",
            SWC1(_) => "SWC1",
            SDC1(_) => "SDC1",
            FADD(_) => "ADD",
            FSUB(_) => "SUB",
            FMUL(_) => "MUL",
            FDIV(_) => "DIV",
            FSQRT(_) => "SQRT",
            FABS(_) => "ABS",
            FMOV(_) => "MOV",
            FNEG(_) => "NEG",
            ROUND_L(_) => "ROUND.L",
            TRUNC_L(_) => "TRUNC.L",
            CEIL_L(_) => "CEIL.L",
            FLOOR_L(_) => "FLOOR.L",
            ROUND_W(_) => "ROUND.W",
            TRUNC_W(_) => "TRUNC.W",
            CEIL_W(_) => "CEIL.W",
            FLOOR_W(_) => "FLOOR.W",
            CVT_S(_) => "CVT.S",
            CVT_D(_) => "CVT.D",
            CVT_W(_) => "CVT.W",
            CVT_L(_) => "CVT.L",
            C(..) => "C",
            COP { .. } => "COP",
            RESERVED(_) => "RESERVED",
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;

        let m = self.mnemonic();
        match self {
            NOP | SYSCALL | BREAK | SYNC | TLBR | TLBWI | TLBWR | TLBP | ERET => write!(f, "{}", m),

            SLL(a) | SRL(a) | SRA(a) | DSLL(a) | DSRL(a) | DSRA(a) | DSLL32(a) | DSRL32(a)
            | DSRA32(a) => write!(f, "{} {}, {}, {}", m, a.rd, a.rt, a.shamt),
            SLLV(a) | SRLV(a) | SRAV(a) | DSLLV(a) | DSRLV(a) | DSRAV(a) => {
                write!(f, "{} {}, {}, {}", m, a.rd, a.rt, a.rs)
            }
            JR(a) | MTHI(a) | MTLO(a) => write!(f, "{} {}", m, a.rs),
            JALR(a) => write!(f, "{} {}, {}", m, a.rd, a.rs),
            MFHI(a) | MFLO(a) => write!(f, "{} {}", m, a.rd),
            MULT(a) | MULTU(a) | DIV(a) | DIVU(a) | DMULT(a) | DMULTU(a) | DDIV(a)
            | DDIVU(a) | TGE(a) | TGEU(a) | TLT(a) | TLTU(a) | TEQ(a) | TNE(a) => {
                write!(f, "{} {}, {}", m, a.rs, a.rt)
            }
            ADD(a) | ADDU(a) | SUB(a) | SUBU(a) | AND(a) | OR(a) | XOR(a) | NOR(a) | SLT(a)
            | SLTU(a) | DADD(a) | DADDU(a) | DSUB(a) | DSUBU(a) => {
                write!(f, "{} {}, {}, {}", m, a.rd, a.rs, a.rt)
            }

            BLTZ(a) | BGEZ(a) | BLTZL(a) | BGEZL(a) | BLTZAL(a) | BGEZAL(a) | BLTZALL(a)
            | BGEZALL(a) | BLEZ(a) | BGTZ(a) | BLEZL(a) | BGTZL(a) => {
                write!(f, "{} {}, {}", m, a.rs, a.imm as i16)
            }
            TGEI(a) | TGEIU(a) | TLTI(a) | TLTIU(a) | TEQI(a) | TNEI(a) => {
                write!(f, "{} {}, {}", m, a.rs, a.imm as i16)
            }
            BEQ(a) | BNE(a) | BEQL(a) | BNEL(a) => {
                write!(f, "{} {}, {}, {}", m, a.rs, a.rt, a.imm as i16)
            }
            J(a) | JAL(a) => write!(f, "{} {:#x}", m, a.target << 2),

            ADDI(a) | ADDIU(a) | SLTI(a) | SLTIU(a) | DADDI(a) | DADDIU(a) => {
                write!(f, "{} {}, {}, {}", m, a.rt, a.rs, a.imm as i16)
            }
            ANDI(a) | ORI(a) | XORI(a) => write!(f, "{} {}, {}, {:#x}", m, a.rt, a.rs, a.imm),
            LUI(a) => write!(f, "{} {}, {:#x}", m, a.rt, a.imm),

            LB(a) | LBU(a) | LH(a) | LHU(a) | LW(a) | LWU(a) | LWL(a) | LWR(a) | LD(a)
            | LDL(a) | LDR(a) | LL(a) | LLD(a) | SB(a) | SH(a) | SW(a) | SWL(a) | SWR(a)
            | SD(a) | SDL(a) | SDR(a) | SC(a) | SCD(a) => {
                write!(f, "{} {}, {}({})", m, a.rt, a.imm as i16, a.rs)
            }
            CACHE(a) => write!(f, "{} {:#x}, {}({})", m, a.rt.0, a.imm as i16, a.rs),

            MFC0(a) | DMFC0(a) | MTC0(a) | DMTC0(a) => write!(f, "{} {}, ${}", m, a.rt, a.rd),
            MFC1(a) | DMFC1(a) | MTC1(a) | DMTC1(a) => {
                write!(f, "{} {}, {}", m, a.rt, FloatRegister(a.rd))
            }
            CFC1(a) | CTC1(a) => write!(f, "{} {}, $fcr{}", m, a.rt, a.rd),
            BC1F(a) | BC1T(a) | BC1FL(a) | BC1TL(a) => write!(f, "{} {}", m, a.imm as i16),
            LWC1(a) | LDC1(a) | SWC1(a) | SDC1(a) => {
                write!(f, "{} {}, {}({})", m, a.ft, a.imm as i16, a.base)
            }

            FADD(a) | FSUB(a) | FMUL(a) | FDIV(a) => {
                write!(f, "{}.{} {}, {}, {}", m, a.fmt, a.fd, a.fs, a.ft)
            }
            C(a, cond) => write!(f, "C.{}.{} {}, {}", CONDITIONS[*cond as usize & 15], a.fmt, a.fs, a.ft),
            FSQRT(a) | FABS(a) | FMOV(a) | FNEG(a) | ROUND_L(a) | TRUNC_L(a) | CEIL_L(a)
            | FLOOR_L(a) | ROUND_W(a) | TRUNC_W(a) | CEIL_W(a) | FLOOR_W(a) | CVT_S(a)
            | CVT_D(a) | CVT_W(a) | CVT_L(a) => {
                write!(f, "{}.{} {}, {}", m, a.fmt, a.fd, a.fs)
            }

            COP { unit, word } => write!(f, "COP{} {:#010x}", unit, word),
            RESERVED(word) => write!(f, "{} {:#010x}", m, word),
        }
    }
}

fn r_args(word: u32) -> RArgs {
    RArgs {
        rs: Register::field(word, 21),
        rt: Register::field(word, 16),
        rd: Register::field(word, 11),
        shamt: (word >> 6) & 31,
    }
}

fn i_args(word: u32) -> IArgs {
    IArgs {
        rs: Register::field(word, 21),
        rt: Register::field(word, 16),
        imm: word as u16,
    }
}

fn cop_args(word: u32) -> CopArgs {
    CopArgs {
        rt: Register::field(word, 16),
        rd: (word >> 11) & 31,
    }
}

fn decode_r_instr(word: u32) -> Instruction {
    use Instruction::*;

    let funct = word & 63;
    let a = r_args(word);

    match funct {
        0x00 => SLL(a),
        0x02 => SRL(a),
        0x03 => SRA(a),
        0x04 => SLLV(a),
        0x06 => SRLV(a),
        0x07 => SRAV(a),
        0x08 => JR(a),
        0x09 => JALR(a),
        0x0c => SYSCALL,
        0x0d => BREAK,
        0x0f => SYNC,
        0x10 => MFHI(a),
        0x11 => MTHI(a),
        0x12 => MFLO(a),
        0x13 => MTLO(a),
        0x14 => DSLLV(a),
        0x16 => DSRLV(a),
        0x17 => DSRAV(a),
        0x18 => MULT(a),
        0x19 => MULTU(a),
        0x1a => DIV(a),
        0x1b => DIVU(a),
        0x1c => DMULT(a),
        0x1d => DMULTU(a),
        0x1e => DDIV(a),
        0x1f => DDIVU(a),
        0x20 => ADD(a),
        0x21 => ADDU(a),
        0x22 => SUB(a),
        0x23 => SUBU(a),
        0x24 => AND(a),
        0x25 => OR(a),
        0x26 => XOR(a),
        0x27 => NOR(a),
        0x2a => SLT(a),
        0x2b => SLTU(a),
        0x2c => DADD(a),
        0x2d => DADDU(a),
        0x2e => DSUB(a),
        0x2f => DSUBU(a),
        0x30 => TGE(a),
        0x31 => TGEU(a),
        0x32 => TLT(a),
        0x33 => TLTU(a),
        0x34 => TEQ(a),
        0x36 => TNE(a),
        0x38 => DSLL(a),
        0x3a => DSRL(a),
        0x3b => DSRA(a),
        0x3c => DSLL32(a),
        0x3e => DSRL32(a),
        0x3f => DSRA32(a),
        _ => RESERVED(word),
    }
}

fn decode_regimm(word: u32) -> Instruction {
    use Instruction::*;

    let a = i_args(word);

    match a.rt.0 {
        0x00 => BLTZ(a),
        0x01 => BGEZ(a),
        0x02 => BLTZL(a),
        0x03 => BGEZL(a),
        0x08 => TGEI(a),
        0x09 => TGEIU(a),
        0x0a => TLTI(a),
        0x0b => TLTIU(a),
        0x0c => TEQI(a),
        0x0e => TNEI(a),
        0x10 => BLTZAL(a),
        0x11 => BGEZAL(a),
        0x12 => BLTZALL(a),
        0x13 => BGEZALL(a),
        _ => RESERVED(word),
    }
}

fn decode_j_instr(word: u32) -> Instruction {
    let a = JArgs {
        target: word & 0x03ff_ffff,
    };

    if word >> 26 == 2 {
        Instruction::J(a)
    } else {
        Instruction::JAL(a)
    }
}

fn decode_i_instr(word: u32) -> Instruction {
    use Instruction::*;

    let opcode = word >> 26;
    let a = i_args(word);
    let f = FIArgs {
        base: a.rs,
        ft: FloatRegister::from(a.rt),
        imm: a.imm,
    };

    match opcode {
        0x04 => BEQ(a),
        0x05 => BNE(a),
        0x06 => BLEZ(a),
        0x07 => BGTZ(a),
        0x08 => ADDI(a),
        0x09 => ADDIU(a),
        0x0a => SLTI(a),
        0x0b => SLTIU(a),
        0x0c => ANDI(a),
        0x0d => ORI(a),
        0x0e => XORI(a),
        0x0f => LUI(a),
        0x14 => BEQL(a),
        0x15 => BNEL(a),
        0x16 => BLEZL(a),
        0x17 => BGTZL(a),
        0x18 => DADDI(a),
        0x19 => DADDIU(a),
        0x1a => LDL(a),
        0x1b => LDR(a),
        0x20 => LB(a),
        0x21 => LH(a),
        0x22 => LWL(a),
        0x23 => LW(a),
        0x24 => LBU(a),
        0x25 => LHU(a),
        0x26 => LWR(a),
        0x27 => LWU(a),
        0x28 => SB(a),
        0x29 => SH(a),
        0x2a => SWL(a),
        0x2b => SW(a),
        0x2c => SDL(a),
        0x2d => SDR(a),
        0x2e => SWR(a),
        0x2f => CACHE(a),
        0x30 => LL(a),
        0x31 => LWC1(f),
        0x34 => LLD(a),
        0x35 => LDC1(f),
        0x37 => LD(a),
        0x38 => SC(a),
        0x39 => SWC1(f),
        0x3c => SCD(a),
        0x3d => SDC1(f),
        0x3f => SD(a),
        _ => RESERVED(word),
    }
}

fn decode_cop0(word: u32) -> Instruction {
    use Instruction::*;

    let rs = (word >> 21) & 31;
    let a = cop_args(word);

    match rs {
        0x00 => MFC0(a),
        0x01 => DMFC0(a),
        0x04 => MTC0(a),
        0x05 => DMTC0(a),
        0x10..=0x1f => match word & 63 {
            0x01 => TLBR,
            0x02 => TLBWI,
            0x06 => TLBWR,
            0x08 => TLBP,
            0x18 => ERET,
            _ => COP { unit: 0, word },
        },
        _ => COP { unit: 0, word },
    }
}

fn decode_cop1(word: u32) -> Instruction {
    use Instruction::*;

    let rs = (word >> 21) & 31;
    let a = cop_args(word);

    let fmt = match rs {
        0x00 => return MFC1(a),
        0x01 => return DMFC1(a),
        0x02 => return CFC1(a),
        0x04 => return MTC1(a),
        0x05 => return DMTC1(a),
        0x06 => return CTC1(a),
        0x08 => {
            let b = i_args(word);
            return match (word >> 16) & 3 {
                0 => BC1F(b),
                1 => BC1T(b),
                2 => BC1FL(b),
                _ => BC1TL(b),
            };
        }
        0x10 => Format::S,
        0x11 => Format::D,
        0x14 => Format::W,
        0x15 => Format::L,
        _ => return COP { unit: 1, word },
    };

    let f = FRArgs {
        fmt,
        ft: FloatRegister((word >> 16) & 31),
        fs: FloatRegister((word >> 11) & 31),
        fd: FloatRegister((word >> 6) & 31),
    };
    let funct = word & 63;

    // W and L only convert to floating point
    if let Format::W | Format::L = fmt {
        return match funct {
            0x20 => CVT_S(f),
            0x21 => CVT_D(f),
            _ => COP { unit: 1, word },
        };
    }

    match funct {
        0x00 => FADD(f),
        0x01 => FSUB(f),
        0x02 => FMUL(f),
        0x03 => FDIV(f),
        0x04 => FSQRT(f),
        0x05 => FABS(f),
        0x06 => FMOV(f),
        0x07 => FNEG(f),
        0x08 => ROUND_L(f),
        0x09 => TRUNC_L(f),
        0x0a => CEIL_L(f),
        0x0b => FLOOR_L(f),
        0x0c => ROUND_W(f),
        0x0d => TRUNC_W(f),
        0x0e => CEIL_W(f),
        0x0f => FLOOR_W(f),
        0x20 if fmt == Format::D => CVT_S(f),
        0x21 if fmt == Format::S => CVT_D(f),
        0x24 => CVT_W(f),
        0x25 => CVT_L(f),
        0x30..=0x3f => C(f, (funct & 15) as u8),
        _ => COP { unit: 1, word },
    }
}
