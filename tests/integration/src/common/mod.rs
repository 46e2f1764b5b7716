//! Common test fixtures
//!
//! `PolicyRule` is written the way generated bindings write their records:
//! a prepare step that reconciles sibling counts and range-checks them, then
//! field-by-field calls into the codec in schema order.

#![allow(dead_code)]

use msrpc_ndr::{
    check_range, reconcile_count, ArrayDescriptor, ChainLink, FullPtr, NdrContext, NdrDecode,
    NdrEncode, NdrError, NdrReader, NdrUnion, NdrWString, NdrWriter, Result, SwitchType,
    UniquePtr,
};
use tracing_subscriber::EnvFilter;

/// Upper bound of `PolicyRule::addresses_count`
pub const MAX_ADDRESSES: u32 = 1000;

pub const PROTOCOL_ICMP: u32 = 1;
pub const PROTOCOL_TCP: u32 = 6;

/// Initialize logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Security principal referenced from a rule
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    pub rid: u32,
    pub name: UniquePtr<NdrWString>,
}

impl Principal {
    pub fn new(rid: u32, name: &str) -> Self {
        Self {
            rid,
            name: UniquePtr::new(NdrWString::new(name)),
        }
    }
}

impl NdrEncode for Principal {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        w.align(Self::ndr_align(w.context()));
        w.write_u32(self.rid);
        w.write(&self.name)?;
        w.write_trailing_gap(Self::ndr_align(w.context()));
        Ok(())
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }
}

impl NdrDecode for Principal {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let align = r.context().word_size();
        r.align(align);
        let rid = r.read_u32()?;
        let name = r.read()?;
        r.read_trailing_gap(align);
        Ok(Self { rid, name })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        2 * ctx.word_size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortRange {
    pub begin: u16,
    pub end: u16,
}

/// Protocol-dependent part of a rule, switched on `PolicyRule::protocol`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolData {
    IcmpTypeCode(u32),
    Ports(PortRange),
    Unknown(u32),
}

impl Default for ProtocolData {
    fn default() -> Self {
        ProtocolData::IcmpTypeCode(0)
    }
}

impl NdrUnion for ProtocolData {
    const SWITCH: SwitchType = SwitchType::U16;
    const DEFAULT_SELECTOR: u32 = PROTOCOL_ICMP;

    fn selector(&self) -> u32 {
        match self {
            ProtocolData::IcmpTypeCode(_) => PROTOCOL_ICMP,
            ProtocolData::Ports(_) => PROTOCOL_TCP,
            ProtocolData::Unknown(selector) => *selector,
        }
    }

    fn recognizes(selector: u32) -> bool {
        matches!(selector, PROTOCOL_ICMP | PROTOCOL_TCP)
    }

    fn default_arm(selector: u32) -> Self {
        match selector {
            PROTOCOL_TCP => ProtocolData::Ports(PortRange::default()),
            _ => ProtocolData::default(),
        }
    }

    fn unknown(selector: u32) -> Self {
        ProtocolData::Unknown(selector)
    }

    fn encode_arm(&self, w: &mut NdrWriter) -> Result<()> {
        match self {
            ProtocolData::IcmpTypeCode(code) => w.write_u32(*code),
            ProtocolData::Ports(range) => {
                w.write_u16(range.begin);
                w.write_u16(range.end);
            }
            ProtocolData::Unknown(_) => {}
        }
        Ok(())
    }

    fn decode_arm(selector: u32, r: &mut NdrReader) -> Result<Self> {
        match selector {
            PROTOCOL_ICMP => Ok(ProtocolData::IcmpTypeCode(r.read_u32()?)),
            PROTOCOL_TCP => Ok(ProtocolData::Ports(PortRange {
                begin: r.read_u16()?,
                end: r.read_u16()?,
            })),
            selector => Err(NdrError::UnknownVariant { selector }),
        }
    }

    fn arm_align(_ctx: &NdrContext) -> usize {
        4
    }
}

/// Conformant rule record
///
/// ```text
/// [size_is(addresses_max), length_is(addresses_count)] addresses
/// flags, description*, owner*, delegate*, protocol,
/// [switch_is(protocol)] protocol_data, addresses_count
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyRule {
    pub flags: u16,
    pub description: UniquePtr<NdrWString>,
    pub owner: FullPtr<Principal>,
    pub delegate: FullPtr<Principal>,
    pub protocol: u32,
    pub protocol_data: ProtocolData,
    pub addresses_max: u32,
    pub addresses_count: u32,
    pub addresses: Vec<u32>,
}

impl NdrEncode for PolicyRule {
    fn ndr_encode(&self, w: &mut NdrWriter) -> Result<()> {
        let align = Self::ndr_align(w.context());
        w.write_size(u64::from(self.addresses_max))?;
        w.align(align);
        w.write_u16(self.flags);
        w.write(&self.description)?;
        w.write(&self.owner)?;
        w.write(&self.delegate)?;
        w.write_u32(self.protocol);
        w.write_union(self.protocol, &self.protocol_data)?;
        w.write_u32(self.addresses_count);
        w.write_varying_elements(
            ArrayDescriptor::new(self.addresses_count, self.addresses_max),
            &self.addresses,
        )?;
        w.write_trailing_gap(align);
        Ok(())
    }

    fn ndr_align(ctx: &NdrContext) -> usize {
        ctx.word_size()
    }

    fn ndr_prepare(&mut self) -> Result<()> {
        reconcile_count(&mut self.addresses_count, self.addresses.len())?;
        check_range("addresses_count", u64::from(self.addresses_count), u64::from(MAX_ADDRESSES))?;
        self.addresses_max = self.addresses_max.max(self.addresses_count);
        self.owner.ndr_prepare()?;
        self.delegate.ndr_prepare()
    }

    fn ndr_validate(&self) -> Result<()> {
        let count = match self.addresses_count {
            0 => self.addresses.len() as u64,
            n => u64::from(n),
        };
        check_range("addresses_count", count, u64::from(MAX_ADDRESSES))?;
        self.owner.ndr_validate()?;
        self.delegate.ndr_validate()
    }
}

impl NdrDecode for PolicyRule {
    fn ndr_decode(r: &mut NdrReader) -> Result<Self> {
        let align = r.context().word_size();
        let addresses_max = r.read_size()?;
        r.align(align);
        let flags = r.read_u16()?;
        let description = r.read()?;
        let owner = r.read()?;
        let delegate = r.read()?;
        let protocol = r.read_u32()?;
        let protocol_data = r.read_union()?;
        let addresses_count = r.read_u32()?;
        let addresses = r.read_varying_elements(addresses_max)?;
        r.read_trailing_gap(align);

        Ok(Self {
            flags,
            description,
            owner,
            delegate,
            protocol,
            protocol_data,
            addresses_max: u32::try_from(addresses_max).map_err(|_| NdrError::InvalidLength {
                field: "addresses_max",
                value: addresses_max,
                max: u64::from(u32::MAX),
            })?,
            addresses_count,
            addresses,
        })
    }

    fn ndr_min_size(ctx: &NdrContext) -> usize {
        8 * ctx.word_size()
    }
}

impl ChainLink for PolicyRule {}

/// The reference scenario: a null description, one owner referenced from
/// two fields, 3 addresses under a maximum of 5, and the TCP arm of the
/// protocol union.
pub fn sample_rule() -> PolicyRule {
    let owner = FullPtr::new(Principal::new(544, "svc"));
    PolicyRule {
        flags: 0x0101,
        description: UniquePtr::null(),
        delegate: owner.alias(),
        owner,
        protocol: PROTOCOL_TCP,
        protocol_data: ProtocolData::Ports(PortRange { begin: 80, end: 443 }),
        addresses_max: 5,
        addresses_count: 3,
        addresses: vec![0x0A00_0001, 0x0A00_0002, 0x0A00_0003],
    }
}

/// Byte offsets of the reference scenario under NDR 2.0
pub mod layout {
    /// Between `flags` and the `description` referent id
    pub const FLAGS_GAP: std::ops::Range<usize> = 6..8;
    pub const DESCRIPTION_ID: std::ops::Range<usize> = 8..12;
    pub const OWNER_ID: std::ops::Range<usize> = 12..16;
    pub const DELEGATE_ID: std::ops::Range<usize> = 16..20;
    /// Between the 16-bit discriminant and the 4-aligned arm
    pub const UNION_GAP: std::ops::Range<usize> = 26..28;
    /// First byte of the deferred region
    pub const DEFERRED: usize = 56;
    /// Inline part, owner payload once, owner name string
    pub const TOTAL: usize = 56 + 8 + 20;
}

/// Deterministic pseudo-random bytes (xorshift)
pub fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}
