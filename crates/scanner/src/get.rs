use base64::Engine;

use crate::{
    GetError,
    find::find,
    scan::TokenKind,
};

/// Извлекает число по селектору.
///
/// Возвращает `None`, если путь не разрешился или найден токен другого
/// вида; значение по умолчанию остаётся на вызывающей стороне
/// (`get_number(..).unwrap_or(42.0)`).
///
/// # Пример
///
/// ```
/// use sift_scanner::get_number;
///
/// let doc = b"[1,[2,[],3,[4,5]]]";
/// assert_eq!(get_number(doc, "$[1][3][1]").unwrap_or(42.0), 5.0);
/// assert_eq!(get_number(doc, "$[1][3][2]").unwrap_or(42.0), 42.0);
/// ```
pub fn get_number(src: &[u8], path: &str) -> Option<f64> {
    let found = find(src, path)?;
    if found.kind != TokenKind::Number {
        return None;
    }
    // Токен уже отмерен числовым лексером, так что разбор не должен
    // отказать; тем не менее ошибки не превращаются в панику.
    std::str::from_utf8(found.bytes).ok()?.parse::<f64>().ok()
}

/// Извлекает логическое значение по селектору.
pub fn get_bool(src: &[u8], path: &str) -> Option<bool> {
    match find(src, path)?.kind {
        TokenKind::True => Some(true),
        TokenKind::False => Some(false),
        _ => None,
    }
}

/// Извлекает строку по селектору, раскрывая escape-последовательности в
/// буфер назначения.
///
/// Поддерживаются `\b \f \n \r \t \\ \" \/` и `\uXXXX` (включая
/// суррогатные пары, дающие четырёхбайтовые формы UTF-8). При успехе
/// возвращается длина декодированных байтов; если после них остаётся
/// место, дописывается завершающий нулевой байт, не входящий в длину.
///
/// # Пример
///
/// ```
/// use sift_scanner::get_string;
///
/// let doc = "{\"ы\":\"превед\"}".as_bytes();
/// let mut buf = [0u8; 100];
/// let n = get_string(doc, "$.ы", &mut buf).unwrap();
/// assert_eq!(n, 12);
/// assert_eq!(&buf[..n], "превед".as_bytes());
/// assert_eq!(buf[n], 0);
/// ```
pub fn get_string(
    src: &[u8],
    path: &str,
    dest: &mut [u8],
) -> Result<usize, GetError> {
    let body = string_body(src, path)?;
    unescape(body, dest)
}

/// Извлекает строку по селектору и декодирует её тело как base64.
///
/// Используется стандартный алфавит с дополнением `=`. Сканируется
/// самый длинный префикс из символов алфавита, и декодируются только
/// целые четырёхбайтовые группы, как в остальных инструментах этого
/// семейства.
pub fn get_base64(
    src: &[u8],
    path: &str,
    dest: &mut [u8],
) -> Result<usize, GetError> {
    let body = string_body(src, path)?;
    let prefix = body
        .iter()
        .position(|&b| !is_base64_byte(b))
        .unwrap_or(body.len());
    let quads = prefix - prefix % 4;
    let n = base64::engine::general_purpose::STANDARD
        .decode_slice(&body[..quads], dest)
        .map_err(|err| match err {
            base64::DecodeSliceError::OutputSliceTooSmall => {
                GetError::Overflow
            }
            base64::DecodeSliceError::DecodeError(_) => GetError::Malformed,
        })?;
    if n < dest.len() {
        dest[n] = 0;
    }
    Ok(n)
}

/// Извлекает строку по селектору и декодирует её тело как пары
/// шестнадцатеричных цифр. Нечётная длина или не-hex байт — ошибка.
pub fn get_hex(
    src: &[u8],
    path: &str,
    dest: &mut [u8],
) -> Result<usize, GetError> {
    let body = string_body(src, path)?;
    if body.len() % 2 != 0 {
        return Err(GetError::Malformed);
    }
    let n = body.len() / 2;
    if n > dest.len() {
        return Err(GetError::Overflow);
    }
    for (i, pair) in body.chunks_exact(2).enumerate() {
        let hi = hex_value(pair[0]).ok_or(GetError::Malformed)?;
        let lo = hex_value(pair[1]).ok_or(GetError::Malformed)?;
        dest[i] = hi << 4 | lo;
    }
    if n < dest.len() {
        dest[n] = 0;
    }
    Ok(n)
}

/// Находит строковый токен и возвращает его тело между кавычками.
fn string_body<'a>(src: &'a [u8], path: &str) -> Result<&'a [u8], GetError> {
    let found = find(src, path).ok_or(GetError::NotFound)?;
    if found.kind != TokenKind::String {
        return Err(GetError::NotFound);
    }
    Ok(&found.bytes[1..found.bytes.len() - 1])
}

/// Раскрывает escape-последовательности тела строки в `dest`.
pub(crate) fn unescape(s: &[u8], dest: &mut [u8]) -> Result<usize, GetError> {
    let (mut i, mut j) = (0, 0);
    while i < s.len() {
        if s[i] == b'\\' && i + 1 < s.len() {
            if s[i + 1] == b'u' {
                let (cp, adv) = unicode_escape(&s[i..])?;
                let ch = char::from_u32(cp).ok_or(GetError::Malformed)?;
                let mut utf8 = [0u8; 4];
                let encoded = ch.encode_utf8(&mut utf8).as_bytes();
                if j + encoded.len() > dest.len() {
                    return Err(GetError::Overflow);
                }
                dest[j..j + encoded.len()].copy_from_slice(encoded);
                j += encoded.len();
                i += adv;
            } else {
                let c = unescape_byte(s[i + 1])
                    .ok_or(GetError::Malformed)?;
                if j >= dest.len() {
                    return Err(GetError::Overflow);
                }
                dest[j] = c;
                j += 1;
                i += 2;
            }
        } else {
            if j >= dest.len() {
                return Err(GetError::Overflow);
            }
            dest[j] = s[i];
            j += 1;
            i += 1;
        }
    }
    if j < dest.len() {
        dest[j] = 0;
    }
    Ok(j)
}

/// Обратное отображение escape-символа в байт.
fn unescape_byte(c: u8) -> Option<u8> {
    match c {
        b'b' => Some(0x08),
        b'f' => Some(0x0c),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'\\' => Some(b'\\'),
        b'"' => Some(b'"'),
        b'/' => Some(b'/'),
        _ => None,
    }
}

/// Разбирает `\uXXXX`, начиная с обратной косой черты, и возвращает
/// кодовую точку и число потреблённых байтов. Старший суррогат требует
/// немедленно следующего младшего; одиночные суррогаты — ошибка.
fn unicode_escape(s: &[u8]) -> Result<(u32, usize), GetError> {
    let hi = hex4(s, 2)?;
    match hi {
        0xd800..=0xdbff => {
            if s.len() < 12 || s[6] != b'\\' || s[7] != b'u' {
                return Err(GetError::Malformed);
            }
            let lo = hex4(s, 8)?;
            if !(0xdc00..=0xdfff).contains(&lo) {
                return Err(GetError::Malformed);
            }
            let cp =
                0x10000 + ((hi - 0xd800) << 10) + (lo - 0xdc00);
            Ok((cp, 12))
        }
        0xdc00..=0xdfff => Err(GetError::Malformed),
        _ => Ok((hi, 6)),
    }
}

/// Читает четыре шестнадцатеричные цифры, начиная с `at`.
fn hex4(s: &[u8], at: usize) -> Result<u32, GetError> {
    if s.len() < at + 4 {
        return Err(GetError::Malformed);
    }
    let mut v: u32 = 0;
    for &b in &s[at..at + 4] {
        v = v << 4 | hex_value(b).ok_or(GetError::Malformed)? as u32;
    }
    Ok(v)
}

/// Значение одной шестнадцатеричной цифры.
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Байт стандартного алфавита base64, включая дополнение.
fn is_base64_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'+' || c == b'/' || c == b'='
}
