//! Hashing, HMAC, and AES functions
//!
//! Every entry operates on bytes; string inputs are taken as UTF-8. Digest
//! output is lowercase hex unless the `*Base64` variant is called.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::interpreter::Evaluator;
use crate::udm::Udm;

use super::encoding::want_bytes;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub fn md5(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("md5", &args[0])?;
    Ok(Udm::Str(hex::encode(Md5::digest(&bytes))))
}

pub fn sha1(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha1", &args[0])?;
    Ok(Udm::Str(hex::encode(Sha1::digest(&bytes))))
}

pub fn sha256(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha256", &args[0])?;
    Ok(Udm::Str(hex::encode(Sha256::digest(&bytes))))
}

pub fn sha512(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha512", &args[0])?;
    Ok(Udm::Str(hex::encode(Sha512::digest(&bytes))))
}

pub fn md5_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("md5Base64", &args[0])?;
    Ok(Udm::Str(BASE64.encode(Md5::digest(&bytes))))
}

pub fn sha1_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha1Base64", &args[0])?;
    Ok(Udm::Str(BASE64.encode(Sha1::digest(&bytes))))
}

pub fn sha256_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha256Base64", &args[0])?;
    Ok(Udm::Str(BASE64.encode(Sha256::digest(&bytes))))
}

pub fn sha512_base64(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    let bytes = want_bytes("sha512Base64", &args[0])?;
    Ok(Udm::Str(BASE64.encode(Sha512::digest(&bytes))))
}

fn hmac_bytes<M>(func: &str, args: &[Udm]) -> Result<Vec<u8>, Diagnostic>
where
    M: Mac + hmac::digest::KeyInit,
{
    let key = want_bytes(func, &args[0])?;
    let message = want_bytes(func, &args[1])?;
    let mut mac = <M as Mac>::new_from_slice(&key).map_err(|_| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            format!("`{}` received an unusable key", func),
        )
    })?;
    mac.update(&message);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha1(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(hex::encode(hmac_bytes::<Hmac<Sha1>>(
        "hmacSha1",
        &args,
    )?)))
}

pub fn hmac_sha256(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(hex::encode(hmac_bytes::<Hmac<Sha256>>(
        "hmacSha256",
        &args,
    )?)))
}

pub fn hmac_sha512(_ev: &mut Evaluator, args: Vec<Udm>, _span: Span) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(hex::encode(hmac_bytes::<Hmac<Sha512>>(
        "hmacSha512",
        &args,
    )?)))
}

pub fn hmac_sha1_base64(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(BASE64.encode(hmac_bytes::<Hmac<Sha1>>(
        "hmacSha1Base64",
        &args,
    )?)))
}

pub fn hmac_sha256_base64(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(BASE64.encode(hmac_bytes::<Hmac<Sha256>>(
        "hmacSha256Base64",
        &args,
    )?)))
}

pub fn hmac_sha512_base64(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    Ok(Udm::Str(BASE64.encode(hmac_bytes::<Hmac<Sha512>>(
        "hmacSha512Base64",
        &args,
    )?)))
}

/// AES-128-CBC with PKCS#7 padding; key and IV must be 16 bytes
pub fn encrypt_aes128_cbc(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    let plaintext = want_bytes("encryptAES128CBC", &args[0])?;
    let key = want_bytes("encryptAES128CBC", &args[1])?;
    let iv = want_bytes("encryptAES128CBC", &args[2])?;
    let cipher = Aes128CbcEnc::new_from_slices(&key, &iv).map_err(|_| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            "`encryptAES128CBC` needs a 16-byte key and a 16-byte IV",
        )
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
    Ok(Udm::Binary {
        bytes: ciphertext,
        encoding: None,
    })
}

pub fn decrypt_aes128_cbc(
    _ev: &mut Evaluator,
    args: Vec<Udm>,
    _span: Span,
) -> Result<Udm, Diagnostic> {
    let ciphertext = want_bytes("decryptAES128CBC", &args[0])?;
    let key = want_bytes("decryptAES128CBC", &args[1])?;
    let iv = want_bytes("decryptAES128CBC", &args[2])?;
    let cipher = Aes128CbcDec::new_from_slices(&key, &iv).map_err(|_| {
        Diagnostic::new(
            ErrorKind::FunctionArgument,
            "`decryptAES128CBC` needs a 16-byte key and a 16-byte IV",
        )
    })?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| {
            Diagnostic::new(
                ErrorKind::FunctionArgument,
                "`decryptAES128CBC` could not remove padding; wrong key, IV, or ciphertext",
            )
        })?;
    Ok(Udm::Binary {
        bytes: plaintext,
        encoding: None,
    })
}
