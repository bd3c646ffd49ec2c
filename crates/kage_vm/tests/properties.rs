use kage_vm::crypto::{self, CryptoError};
use kage_vm::{
    codec, compile, evaluate, full_decrypt, parse, peel, run, tlv, ExecError, Instr, KageError,
    Opcode, ParseErrorKind, SecretKey, Value, Vm, VmConfig,
};
use rand::{Rng, RngCore};

fn random_key(rng: &mut impl RngCore) -> [u8; 32] {
    let mut k = [0u8; 32];
    rng.fill_bytes(&mut k);
    k
}

fn random_bytes(rng: &mut impl Rng, max: usize) -> Vec<u8> {
    let n = rng.gen_range(0..=max);
    let mut b = vec![0u8; n];
    rng.fill_bytes(&mut b);
    b
}

// ── Crypto engine ───────────────────────────────────────────────

#[test]
fn round_trip_random_plaintexts() {
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let key = random_key(&mut rng);
        let p = random_bytes(&mut rng, 300);
        let env = crypto::encrypt(&p, &key).unwrap();
        assert_eq!(crypto::decrypt(&env, &key).unwrap(), p);
    }
}

#[test]
fn wrong_key_is_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..32 {
        let k1 = random_key(&mut rng);
        let mut k2 = k1;
        k2[rng.gen_range(0..32usize)] ^= 1u8 << rng.gen_range(0..8u32);
        let env = crypto::encrypt(b"payload", &k1).unwrap();
        assert_eq!(crypto::decrypt(&env, &k2), Err(CryptoError::AuthenticationFailure));
    }
}

#[test]
fn encryption_is_nondeterministic() {
    let key = [9u8; 32];
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        assert!(seen.insert(crypto::encrypt(b"same plaintext", &key).unwrap()));
    }
}

#[test]
fn sixteen_byte_key_is_refused() {
    assert_eq!(
        crypto::encrypt(b"p", &[0u8; 16]),
        Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 })
    );
}

// ── Base64 ──────────────────────────────────────────────────────

#[test]
fn base64_identity_including_empty() {
    let mut rng = rand::thread_rng();
    assert!(codec::decode(&codec::encode(b"")).unwrap().is_empty());
    for _ in 0..128 {
        let b = random_bytes(&mut rng, 64);
        assert_eq!(codec::decode(&codec::encode(&b)).unwrap(), b);
    }
}

// ── Pipeline ────────────────────────────────────────────────────

#[test]
fn literal_program_yields_plaintext() {
    let key = [1u8; 32];
    assert_eq!(run("\"hello\"", &key).unwrap(), Value::from("hello"));
}

#[test]
fn encrypt_program_yields_envelope() {
    let key = [1u8; 32];
    let out = run("encrypt \"secret\"", &key).unwrap();
    assert_ne!(out, Value::from("secret"));
    assert!(crypto::looks_like_envelope(out.as_str().unwrap()));
    assert_eq!(full_decrypt(out, &key), Value::from("secret"));
}

#[test]
fn decrypting_a_literal_fails_the_run() {
    let key = [1u8; 32];
    let err = run("decrypt decrypt \"x\"", &key).unwrap_err();
    assert!(err.crypto().is_some(), "got {err}");
}

#[test]
fn malformed_sources() {
    let key = [1u8; 32];
    let kind = |src: &str| run(src, &key).unwrap_err().parse().map(|p| p.kind);
    assert_eq!(kind("encrypt"), Some(ParseErrorKind::MissingOperand));
    assert_eq!(kind("\"unterminated"), Some(ParseErrorKind::UnclosedString));
    assert_eq!(kind(""), Some(ParseErrorKind::EmptySource));
    assert_eq!(kind("   "), Some(ParseErrorKind::EmptySource));
    assert_eq!(kind("shred \"x\""), Some(ParseErrorKind::InvalidToken));
}

#[test]
fn bare_decrypt_underflows() {
    let key = [1u8; 32];
    let mut vm = Vm::new(VmConfig::default(), &key);
    match vm.execute(&[Instr::Decrypt]) {
        Err(ExecError::StackUnderflow(Opcode::Decrypt)) => {}
        other => panic!("expected underflow, got {other:?}"),
    }
}

#[test]
fn evaluate_peels_every_layer() {
    let key = SecretKey::generate().unwrap();
    let depth = 12;
    let src = format!("{}\"onion\"", "encrypt ".repeat(depth));
    let out = run(&src, key.as_bytes()).unwrap();
    let peeled = peel(out, key.as_bytes());
    assert_eq!(peeled.layers, depth);
    assert_eq!(peeled.value, Value::from("onion"));
    assert_eq!(evaluate(&src, key.as_bytes()).unwrap(), Value::from("onion"));
}

#[test]
fn stored_bytecode_runs_like_source() {
    let key = [3u8; 32];
    let bc = compile(&parse("decrypt encrypt \"via tlv\" encrypt \"tail\"").unwrap()).unwrap();
    let file = tlv::encode_bytecode(&bc).unwrap();
    let loaded = tlv::decode_bytecode(&file).unwrap();
    assert_eq!(loaded, bc);
    let out = kage_vm::execute_bytecode(&loaded, &key, VmConfig::default()).unwrap();
    assert_eq!(out.values[0], Value::from("via tlv"));
    assert_eq!(full_decrypt(out.values[1].clone(), &key), Value::from("tail"));
}

#[test]
fn unknown_tlv_surfaces_as_kage_error() {
    let err: KageError = tlv::decode_stream(&[0x42]).unwrap_err().into();
    assert!(matches!(err, KageError::Tlv(_)));
}

// ── Concurrency ─────────────────────────────────────────────────

#[test]
fn core_types_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<kage_vm::Program>();
    assert_send_sync::<kage_vm::Bytecode>();
    assert_send_sync::<Value>();
    assert_send_sync::<SecretKey>();
    assert_send_sync::<Vm<'static>>();
    assert_send_sync::<KageError>();
}

#[test]
fn independent_runs_in_parallel() {
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            std::thread::spawn(move || {
                let key = [i; 32];
                let src = format!("encrypt encrypt \"thread {i}\"");
                evaluate(&src, &key).unwrap()
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap(), Value::Str(format!("thread {i}")));
    }
}
