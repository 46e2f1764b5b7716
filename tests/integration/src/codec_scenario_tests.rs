//! Codec Scenario Tests - Generated Record Encoding
//!
//! These tests drive the codec the way generated bindings do:
//! - Prepare step with count reconciliation and range checks
//! - Null, unique and aliased full pointers with a deferred region
//! - Conformant varying arrays with a count below the maximum
//! - Unions switched on a sibling field
//! - Linked lists of records

mod common;

use msrpc_ndr::{
    decode, encode, encode_prepared, FullPtr, NdrContext, NdrEncode, NdrError, NdrPtr,
    NdrWString, NoHook, PointerChain, UniquePtr,
};

use common::*;

#[test]
fn test_policy_rule_scenario() {
    init_logging();

    let rule = sample_rule();
    let bytes = encode(&rule, NdrContext::new()).unwrap();

    assert_eq!(bytes.len(), layout::TOTAL);
    assert_eq!(&bytes[layout::FLAGS_GAP], &[0, 0]);
    assert_eq!(&bytes[layout::UNION_GAP], &[0, 0]);

    // Null description, owner and delegate share one referent id
    assert_eq!(&bytes[layout::DESCRIPTION_ID], &[0, 0, 0, 0]);
    assert_eq!(&bytes[layout::OWNER_ID], &[0x00, 0x00, 0x02, 0x00]);
    assert_eq!(&bytes[layout::DELEGATE_ID], &[0x00, 0x00, 0x02, 0x00]);

    // Owner payload appears once, followed by its name's referent id
    let deferred = &bytes[layout::DEFERRED..];
    assert_eq!(&deferred[..8], &[0x20, 0x02, 0, 0, 0x04, 0x00, 0x02, 0x00]);

    let decoded: PolicyRule = decode(bytes, NdrContext::new()).unwrap();
    assert_eq!(decoded, rule);
    assert!(decoded.description.is_null());
    assert!(decoded.owner.ptr_eq(&decoded.delegate));
    assert_eq!(decoded.addresses.len(), 3);
    assert_eq!(decoded.addresses_max, 5);
    assert_eq!(
        decoded.owner.as_ref().and_then(|p| p.name.as_ref()).map(NdrWString::as_str),
        Some("svc")
    );
}

#[test]
fn test_encoding_is_deterministic() {
    let ctx = NdrContext::new();
    let first = encode(&sample_rule(), ctx).unwrap();
    let second = encode(&sample_rule(), ctx).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_round_trip_other_contexts() {
    init_logging();

    for ctx in [NdrContext::ndr64(), NdrContext::big_endian()] {
        let rule = sample_rule();
        let bytes = encode(&rule, ctx).unwrap();
        let decoded: PolicyRule = decode(bytes, ctx).unwrap();
        assert_eq!(decoded, rule, "context {:?}", ctx);
        assert!(decoded.owner.ptr_eq(&decoded.delegate));
    }
}

#[test]
fn test_ndr64_referent_ids_are_eight_bytes() {
    let bytes = encode(&sample_rule(), NdrContext::ndr64()).unwrap();
    // max_count, flags, pad to 16, then three 8-byte referent ids
    assert_eq!(&bytes[16..24], &[0; 8]);
    assert_eq!(&bytes[24..32], &[0x00, 0x00, 0x02, 0x00, 0, 0, 0, 0]);
    assert_eq!(&bytes[24..32], &bytes[32..40]);
}

#[test]
fn test_default_record_round_trip() {
    let ctx = NdrContext::new();
    let rule = PolicyRule::default();
    let bytes = encode(&rule, ctx).unwrap();
    let decoded: PolicyRule = decode(bytes, ctx).unwrap();
    assert_eq!(decoded, rule);
}

#[test]
fn test_prepare_derives_count() {
    let ctx = NdrContext::new();
    let mut rule = sample_rule();
    rule.addresses_count = 0;
    rule.addresses_max = 0;

    let bytes = encode_prepared(&mut rule, ctx, NoHook).unwrap();
    assert_eq!(rule.addresses_count, 3);
    assert_eq!(rule.addresses_max, 3);

    let decoded: PolicyRule = decode(bytes, ctx).unwrap();
    assert_eq!(decoded.addresses, rule.addresses);
}

#[test]
fn test_explicit_count_truncates() {
    let ctx = NdrContext::new();
    let mut rule = sample_rule();
    rule.addresses.extend([0x0A00_0004, 0x0A00_0005]);

    let bytes = encode_prepared(&mut rule, ctx, NoHook).unwrap();
    let decoded: PolicyRule = decode(bytes, ctx).unwrap();
    assert_eq!(decoded.addresses_count, 3);
    assert_eq!(decoded.addresses, &rule.addresses[..3]);
}

#[test]
fn test_after_prepare_hook() {
    let ctx = NdrContext::new();
    let mut rule = sample_rule();

    let bytes = encode_prepared(&mut rule, ctx, |r: &mut PolicyRule| -> msrpc_ndr::Result<()> {
        r.flags |= 0x8000;
        r.description = UniquePtr::new(NdrWString::new("allow web"));
        Ok(())
    })
    .unwrap();

    let decoded: PolicyRule = decode(bytes, ctx).unwrap();
    assert_eq!(decoded.flags, 0x8101);
    assert_eq!(decoded.description.get().map(NdrWString::as_str), Some("allow web"));

    let rejected = encode_prepared(&mut rule, ctx, |_: &mut PolicyRule| -> msrpc_ndr::Result<()> {
        Err(NdrError::InvalidLength { field: "flags", value: 0x8101, max: 0x7FFF })
    });
    assert!(matches!(rejected, Err(NdrError::InvalidLength { field: "flags", .. })));
}

#[test]
fn test_out_of_range_count_writes_nothing() {
    let mut rule = sample_rule();
    rule.addresses = vec![0; MAX_ADDRESSES as usize + 1];
    rule.addresses_count = 0;

    let err = encode_prepared(&mut rule, NdrContext::new(), NoHook).unwrap_err();
    assert_eq!(err.to_string(), "addresses_count is out of range: 1001 > 1000");
}

#[test]
fn test_shared_rule_is_range_checked() {
    let mut rule = sample_rule();
    rule.addresses = vec![0; MAX_ADDRESSES as usize + 1];
    rule.addresses_count = 0;

    let mut primary = FullPtr::new(rule);
    let _secondary = primary.alias();
    let err = primary.ndr_prepare().unwrap_err();
    assert_eq!(err.to_string(), "addresses_count is out of range: 1001 > 1000");
}

#[test]
fn test_mismatched_union_arm_uses_default() {
    let ctx = NdrContext::new();
    let mut rule = sample_rule();
    rule.protocol = PROTOCOL_ICMP;

    let decoded: PolicyRule = decode(encode(&rule, ctx).unwrap(), ctx).unwrap();
    assert_eq!(decoded.protocol, PROTOCOL_ICMP);
    assert_eq!(decoded.protocol_data, ProtocolData::IcmpTypeCode(0));
}

#[test]
fn test_unrecognized_protocol_uses_default_selector() {
    let ctx = NdrContext::new();
    let mut rule = sample_rule();
    rule.protocol = 17;
    rule.protocol_data = ProtocolData::IcmpTypeCode(8);

    let bytes = encode(&rule, ctx).unwrap();
    // Discriminant written as the default selector
    assert_eq!(&bytes[24..26], &[PROTOCOL_ICMP as u8, 0]);

    let decoded: PolicyRule = decode(bytes, ctx).unwrap();
    assert_eq!(decoded.protocol, 17);
    assert_eq!(decoded.protocol_data, ProtocolData::IcmpTypeCode(8));
}

#[test]
fn test_rule_list_shares_owner() {
    init_logging();

    let ctx = NdrContext::new();
    let template = sample_rule();
    let rules: Vec<PolicyRule> = (0..1000u16)
        .map(|i| PolicyRule {
            flags: i,
            ..template.clone()
        })
        .collect();
    let list = PointerChain::new(rules);

    let bytes = encode(&list, ctx).unwrap();
    let decoded: PointerChain<PolicyRule> = decode(bytes, ctx).unwrap();
    assert_eq!(decoded, list);

    // One owner for the whole list
    let first = &decoded.as_slice()[0];
    assert!(decoded.iter().all(|rule| rule.owner.ptr_eq(&first.owner)));
    assert_eq!(decoded.as_slice()[999].flags, 999);
}
