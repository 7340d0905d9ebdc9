//! Sequence model and function dispatch table
//!
//! A [`Sequence`] is one fully parsed control function: category, leader,
//! intermediates, parameters, final byte and (for OSC/DCS) payload. A
//! static table maps the identifying tuple to a [`FunctionId`]; the
//! terminal then switches on the id. Lookup is linear with the hot entries
//! (cursor motion, SGR, erase) at the front.

use vellum_parser::{CsiSequence, DcsSequence, EscSequence, Params};

/// Control function category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Esc,
    Csi,
    Osc,
    Dcs,
}

/// One fully accumulated control sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub category: Category,
    pub leader: u8,
    pub intermediates: Vec<u8>,
    pub params: Params,
    pub final_byte: u8,
    pub payload: Vec<u8>,
}

impl Sequence {
    pub fn from_csi(csi: CsiSequence) -> Self {
        Self {
            category: Category::Csi,
            leader: csi.leader,
            intermediates: csi.intermediates,
            params: csi.params,
            final_byte: csi.final_byte,
            payload: Vec::new(),
        }
    }

    pub fn from_esc(esc: EscSequence) -> Self {
        Self {
            category: Category::Esc,
            leader: 0,
            intermediates: esc.intermediates,
            params: Params::new(),
            final_byte: esc.final_byte,
            payload: Vec::new(),
        }
    }

    pub fn from_dcs(dcs: DcsSequence) -> Self {
        Self {
            category: Category::Dcs,
            leader: dcs.leader,
            intermediates: dcs.intermediates,
            params: dcs.params,
            final_byte: dcs.final_byte,
            payload: dcs.data,
        }
    }

    pub fn param(&self, index: usize, default: u16) -> u16 {
        self.params.get_or(index, default)
    }
}

/// Outcome of dispatching one sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Ok,
    Invalid,
    Unsupported,
}

/// Identified control functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum FunctionId {
    // Cursor motion
    CUU,
    CUD,
    CUF,
    CUB,
    CNL,
    CPL,
    CHA,
    HPA,
    HPR,
    CUP,
    HVP,
    VPA,
    VPR,
    CHT,
    CBT,
    // Erase / edit
    ED,
    EL,
    ECH,
    ICH,
    DCH,
    IL,
    DL,
    SU,
    SD,
    // Attributes / modes
    SGR,
    SM,
    RM,
    DECSET,
    DECRST,
    DECRQM,
    DECRQM_DEC,
    XTSAVE,
    XTRESTORE,
    // Margins
    DECSTBM,
    DECSLRM,
    // Reports
    DSR,
    DSR_DEC,
    DA1,
    DA2,
    DA3,
    // Cursor save/restore (ANSI.SYS flavors)
    SCOSC,
    SCORC,
    // Tabs
    TBC,
    // Window / versions
    WINMANIP,
    XTVERSION,
    XTCAPTURE,
    XTSMGRAPHICS,
    XTPUSHCOLORS,
    XTPOPCOLORS,
    XTREPORTCOLORS,
    // DEC extended
    DECSCUSR,
    DECSTR,
    DECSCA,
    DECSED,
    DECSEL,
    DECSCL,
    DECCARA,
    DECCRA,
    DECERA,
    DECFRA,
    DECSERA,
    DECIC,
    DECDC,
    DECRQPSR,
    DECSCPP,
    DECSNLS,
    DECSLPP,
    DECSASD,
    DECSSDT,
    DECPS,
    // ESC repertoire
    DECSC,
    DECRC,
    IND,
    NEL,
    HTS,
    RI,
    SS2,
    SS3,
    RIS,
    DECKPAM,
    DECKPNM,
    DECALN,
    DECBI,
    DECFI,
    SCS_G0,
    SCS_G1,
    SCS_G2,
    SCS_G3,
    LS2,
    LS3,
    // DCS repertoire
    DECSIXEL,
    DECRQSS,
    XTGETTCAP,
    STP,
}

/// One row of the dispatch table
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    pub category: Category,
    pub leader: u8,
    pub intermediates: &'static [u8],
    pub final_byte: u8,
    pub id: FunctionId,
    pub name: &'static str,
}

const fn csi(leader: u8, intermediates: &'static [u8], final_byte: u8, id: FunctionId, name: &'static str) -> FunctionDef {
    FunctionDef {
        category: Category::Csi,
        leader,
        intermediates,
        final_byte,
        id,
        name,
    }
}

const fn esc(intermediates: &'static [u8], final_byte: u8, id: FunctionId, name: &'static str) -> FunctionDef {
    FunctionDef {
        category: Category::Esc,
        leader: 0,
        intermediates,
        final_byte,
        id,
        name,
    }
}

const fn dcs(leader: u8, intermediates: &'static [u8], final_byte: u8, id: FunctionId, name: &'static str) -> FunctionDef {
    FunctionDef {
        category: Category::Dcs,
        leader,
        intermediates,
        final_byte,
        id,
        name,
    }
}

/// The dispatch table. Ordered so that the sequences a busy shell emits
/// constantly (SGR, cursor motion, erase) are found first.
pub static FUNCTIONS: &[FunctionDef] = &[
    csi(0, b"", b'm', FunctionId::SGR, "SGR"),
    csi(0, b"", b'H', FunctionId::CUP, "CUP"),
    csi(0, b"", b'K', FunctionId::EL, "EL"),
    csi(0, b"", b'J', FunctionId::ED, "ED"),
    csi(0, b"", b'A', FunctionId::CUU, "CUU"),
    csi(0, b"", b'B', FunctionId::CUD, "CUD"),
    csi(0, b"", b'C', FunctionId::CUF, "CUF"),
    csi(0, b"", b'D', FunctionId::CUB, "CUB"),
    csi(0, b"", b'G', FunctionId::CHA, "CHA"),
    csi(0, b"", b'`', FunctionId::HPA, "HPA"),
    csi(0, b"", b'a', FunctionId::HPR, "HPR"),
    csi(0, b"", b'd', FunctionId::VPA, "VPA"),
    csi(0, b"", b'e', FunctionId::VPR, "VPR"),
    csi(0, b"", b'E', FunctionId::CNL, "CNL"),
    csi(0, b"", b'F', FunctionId::CPL, "CPL"),
    csi(0, b"", b'f', FunctionId::HVP, "HVP"),
    csi(0, b"", b'I', FunctionId::CHT, "CHT"),
    csi(0, b"", b'Z', FunctionId::CBT, "CBT"),
    csi(0, b"", b'X', FunctionId::ECH, "ECH"),
    csi(0, b"", b'@', FunctionId::ICH, "ICH"),
    csi(0, b"", b'P', FunctionId::DCH, "DCH"),
    csi(0, b"", b'L', FunctionId::IL, "IL"),
    csi(0, b"", b'M', FunctionId::DL, "DL"),
    csi(0, b"", b'S', FunctionId::SU, "SU"),
    csi(0, b"", b'T', FunctionId::SD, "SD"),
    csi(0, b"", b'h', FunctionId::SM, "SM"),
    csi(0, b"", b'l', FunctionId::RM, "RM"),
    csi(b'?', b"", b'h', FunctionId::DECSET, "DECSET"),
    csi(b'?', b"", b'l', FunctionId::DECRST, "DECRST"),
    csi(0, b"", b'r', FunctionId::DECSTBM, "DECSTBM"),
    csi(0, b"", b's', FunctionId::DECSLRM, "DECSLRM"),
    csi(0, b"", b'u', FunctionId::SCORC, "SCORC"),
    csi(0, b"", b'n', FunctionId::DSR, "DSR"),
    csi(b'?', b"", b'n', FunctionId::DSR_DEC, "DECXCPR"),
    csi(0, b"", b'c', FunctionId::DA1, "DA1"),
    csi(b'>', b"", b'c', FunctionId::DA2, "DA2"),
    csi(b'=', b"", b'c', FunctionId::DA3, "DA3"),
    csi(0, b"", b'g', FunctionId::TBC, "TBC"),
    csi(0, b"", b't', FunctionId::WINMANIP, "WINMANIP"),
    csi(b'>', b"", b't', FunctionId::XTCAPTURE, "XTCAPTURE"),
    csi(b'>', b"", b'q', FunctionId::XTVERSION, "XTVERSION"),
    csi(b'?', b"", b'S', FunctionId::XTSMGRAPHICS, "XTSMGRAPHICS"),
    csi(b'?', b"", b's', FunctionId::XTSAVE, "XTSAVE"),
    csi(b'?', b"", b'r', FunctionId::XTRESTORE, "XTRESTORE"),
    csi(0, b"#", b'P', FunctionId::XTPUSHCOLORS, "XTPUSHCOLORS"),
    csi(0, b"#", b'Q', FunctionId::XTPOPCOLORS, "XTPOPCOLORS"),
    csi(0, b"#", b'R', FunctionId::XTREPORTCOLORS, "XTREPORTCOLORS"),
    csi(0, b" ", b'q', FunctionId::DECSCUSR, "DECSCUSR"),
    csi(0, b"!", b'p', FunctionId::DECSTR, "DECSTR"),
    csi(0, b"\"", b'q', FunctionId::DECSCA, "DECSCA"),
    csi(0, b"\"", b'p', FunctionId::DECSCL, "DECSCL"),
    csi(b'?', b"", b'J', FunctionId::DECSED, "DECSED"),
    csi(b'?', b"", b'K', FunctionId::DECSEL, "DECSEL"),
    csi(0, b"$", b'r', FunctionId::DECCARA, "DECCARA"),
    csi(0, b"$", b'v', FunctionId::DECCRA, "DECCRA"),
    csi(0, b"$", b'z', FunctionId::DECERA, "DECERA"),
    csi(0, b"$", b'x', FunctionId::DECFRA, "DECFRA"),
    csi(0, b"$", b'{', FunctionId::DECSERA, "DECSERA"),
    csi(0, b"'", b'}', FunctionId::DECIC, "DECIC"),
    csi(0, b"'", b'~', FunctionId::DECDC, "DECDC"),
    csi(0, b"$", b'w', FunctionId::DECRQPSR, "DECRQPSR"),
    csi(0, b"$", b'p', FunctionId::DECRQM, "DECRQM"),
    csi(b'?', b"$", b'p', FunctionId::DECRQM_DEC, "DECRQM(DEC)"),
    csi(0, b"$", b'|', FunctionId::DECSCPP, "DECSCPP"),
    csi(0, b"*", b'|', FunctionId::DECSNLS, "DECSNLS"),
    csi(0, b"$", b'}', FunctionId::DECSASD, "DECSASD"),
    csi(0, b"$", b'~', FunctionId::DECSSDT, "DECSSDT"),
    csi(0, b",", b'~', FunctionId::DECPS, "DECPS"),
    esc(b"", b'7', FunctionId::DECSC, "DECSC"),
    esc(b"", b'8', FunctionId::DECRC, "DECRC"),
    esc(b"", b'D', FunctionId::IND, "IND"),
    esc(b"", b'E', FunctionId::NEL, "NEL"),
    esc(b"", b'H', FunctionId::HTS, "HTS"),
    esc(b"", b'M', FunctionId::RI, "RI"),
    esc(b"", b'N', FunctionId::SS2, "SS2"),
    esc(b"", b'O', FunctionId::SS3, "SS3"),
    esc(b"", b'c', FunctionId::RIS, "RIS"),
    esc(b"", b'=', FunctionId::DECKPAM, "DECKPAM"),
    esc(b"", b'>', FunctionId::DECKPNM, "DECKPNM"),
    esc(b"", b'6', FunctionId::DECBI, "DECBI"),
    esc(b"", b'9', FunctionId::DECFI, "DECFI"),
    esc(b"", b'n', FunctionId::LS2, "LS2"),
    esc(b"", b'o', FunctionId::LS3, "LS3"),
    esc(b"#", b'8', FunctionId::DECALN, "DECALN"),
    dcs(0, b"", b'q', FunctionId::DECSIXEL, "DECSIXEL"),
    dcs(0, b"$", b'q', FunctionId::DECRQSS, "DECRQSS"),
    dcs(0, b"+", b'q', FunctionId::XTGETTCAP, "XTGETTCAP"),
    dcs(0, b"$", b'p', FunctionId::STP, "STP"),
];

/// Charset designations carry the slot in the intermediate, so they are
/// matched structurally rather than through the table.
pub fn lookup_charset_designation(intermediates: &[u8]) -> Option<FunctionId> {
    match intermediates {
        [b'('] => Some(FunctionId::SCS_G0),
        [b')'] => Some(FunctionId::SCS_G1),
        [b'*'] => Some(FunctionId::SCS_G2),
        [b'+'] => Some(FunctionId::SCS_G3),
        _ => None,
    }
}

/// Find the function definition for a sequence
pub fn lookup(seq: &Sequence) -> Option<&'static FunctionDef> {
    FUNCTIONS.iter().find(|def| {
        def.category == seq.category
            && def.leader == seq.leader
            && def.final_byte == seq.final_byte
            && def.intermediates == seq.intermediates.as_slice()
    })
}
