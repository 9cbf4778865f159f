use crate::{
    find::Found,
    scan::{Emit, Event, Scanner, Token, TokenKind},
};

/// Один прямой потомок объекта или массива.
#[derive(Clone, Copy, Debug)]
pub struct Entry<'a> {
    /// Ключ вместе с кавычками; `None` для элементов массива.
    pub key: Option<Token<'a>>,
    /// Порядковый номер потомка внутри контейнера.
    pub index: usize,
    /// Значение потомка. Для вложенных контейнеров срез покрывает весь
    /// текст в скобках включительно.
    pub value: Found<'a>,
    /// Смещение сразу за значением; передаётся в [`next_entry`] для
    /// продолжения обхода.
    pub end: usize,
}

/// Сырые смещения найденного потомка.
#[derive(Clone, Copy, Debug)]
struct RawEntry {
    key: Option<(usize, usize)>,
    index: usize,
    kind: TokenKind,
    voff: usize,
    vlen: usize,
}

/// Состояние пошагового обхода: интересует первый потомок, чьё значение
/// начинается после порога.
#[derive(Debug)]
struct NextState {
    threshold: usize,
    depth: usize,
    index: usize,
    key: Option<(usize, usize)>,
    pending: Option<(usize, Option<(usize, usize)>, usize)>,
    hit: Option<RawEntry>,
}

impl NextState {
    fn new(threshold: usize) -> NextState {
        NextState {
            threshold,
            depth: 0,
            index: 0,
            key: None,
            pending: None,
            hit: None,
        }
    }
}

impl Emit for NextState {
    fn event(&mut self, ev: Event<'_>) -> bool {
        if self.hit.is_some() {
            return false;
        }
        match ev {
            Event::ObjectBegin { offset } | Event::ArrayBegin { offset } => {
                if self.depth == 1 {
                    self.pending =
                        Some((offset, self.key.take(), self.index));
                }
                self.depth += 1;
            }
            Event::ObjectEnd { offset } | Event::ArrayEnd { offset } => {
                self.depth -= 1;
                if self.depth == 1 {
                    if let Some((start, key, index)) = self.pending.take() {
                        if start > self.threshold {
                            let kind = match ev {
                                Event::ObjectEnd { .. } => TokenKind::Object,
                                _ => TokenKind::Array,
                            };
                            self.hit = Some(RawEntry {
                                key,
                                index,
                                kind,
                                voff: start,
                                vlen: offset - start + 1,
                            });
                        } else {
                            self.index += 1;
                        }
                    }
                }
            }
            Event::Key(tok) => {
                if self.depth == 1 {
                    self.key = Some((tok.offset, tok.bytes.len()));
                }
            }
            Event::Value(tok) => {
                if self.depth == 1 {
                    if tok.offset > self.threshold {
                        self.hit = Some(RawEntry {
                            key: self.key.take(),
                            index: self.index,
                            kind: tok.kind,
                            voff: tok.offset,
                            vlen: tok.bytes.len(),
                        });
                    } else {
                        self.index += 1;
                        self.key = None;
                    }
                }
            }
            Event::Comma { .. } | Event::Colon { .. } => {}
        }
        self.hit.is_none()
    }
}

/// Возвращает первый прямой потомок контейнера `src`, чьё значение
/// начинается после смещения `offset`.
///
/// `src` должен начинаться с `{` или `[` самого контейнера. Первый вызов
/// делается с `offset` 0; каждый следующий — со значением [`Entry::end`]
/// предыдущего. `None` означает, что потомков больше нет (или вход не
/// разбирается).
///
/// # Пример
///
/// ```
/// use sift_scanner::{next_entry, TokenKind};
///
/// let doc = b"{\"a\":1}";
/// let e = next_entry(doc, 0).unwrap();
/// assert_eq!(e.key.unwrap().bytes, b"\"a\"");
/// assert_eq!(e.value.bytes, b"1");
/// assert_eq!(e.end, 6);
/// assert!(next_entry(doc, e.end).is_none());
/// ```
pub fn next_entry(src: &[u8], offset: usize) -> Option<Entry<'_>> {
    let mut state = NextState::new(offset);
    let _ = Scanner::new().scan(src, &mut state);
    state.hit.map(|raw| Entry {
        key: raw.key.map(|(koff, klen)| Token {
            kind: TokenKind::Key,
            bytes: &src[koff..koff + klen],
            offset: koff,
        }),
        index: raw.index,
        value: Found {
            kind: raw.kind,
            bytes: &src[raw.voff..raw.voff + raw.vlen],
            offset: raw.voff,
        },
        end: raw.voff + raw.vlen,
    })
}

/// Итератор по прямым потомкам контейнера; обёртка над [`next_entry`].
#[derive(Clone, Debug)]
pub struct Entries<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        let entry = next_entry(self.src, self.pos)?;
        self.pos = entry.end;
        Some(entry)
    }
}

/// Возвращает итератор по прямым потомкам контейнера `src`.
///
/// # Пример
///
/// ```
/// use sift_scanner::entries;
///
/// let kinds: Vec<_> =
///     entries(b"[3,null,{},\"hi\"]").map(|e| e.value.kind).collect();
/// assert_eq!(kinds.len(), 4);
/// ```
pub fn entries(src: &[u8]) -> Entries<'_> {
    Entries { src, pos: 0 }
}
