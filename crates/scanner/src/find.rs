use crate::scan::{Emit, Event, Scanner, TokenKind};

/// Результат поиска по селектору: вид совпавшего токена и его
/// расположение внутри исходных данных.
///
/// Для составных токенов ([`TokenKind::Array`], [`TokenKind::Object`])
/// срез покрывает весь текст в скобках включительно, так что повторное
/// сканирование `bytes` всегда успешно и потребляет срез целиком.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Found<'a> {
    /// Вид совпавшего токена.
    pub kind: TokenKind,
    /// Точный текст токена внутри исходных данных.
    pub bytes: &'a [u8],
    /// Смещение токена от начала исходных данных.
    pub offset: usize,
}

impl<'a> std::fmt::Debug for Found<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use bstr::ByteSlice;

        f.debug_struct("Found")
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.as_bstr())
            .field("offset", &self.offset)
            .finish()
    }
}

/// Состояние селектора, навешиваемое на сканер.
///
/// Селектор держит курсор `pos` в пути, счётчики текущей (`current`) и
/// целевой (`target`) глубины и счётчики индексов массива
/// (`seen`/`want`). Как только совпадение записано, дальнейшие события
/// отбрасываются, и сканер останавливается.
#[derive(Debug)]
struct FindState<'p> {
    path: &'p [u8],
    pos: usize,
    current: usize,
    target: usize,
    seen: i64,
    want: i64,
    container: Option<usize>,
    hit: Option<(TokenKind, usize, usize)>,
}

impl<'p> FindState<'p> {
    fn new(path: &'p [u8]) -> FindState<'p> {
        FindState {
            path,
            pos: 1,
            current: 0,
            target: 0,
            seen: 0,
            want: -1,
            container: None,
            hit: None,
        }
    }

    /// Путь полностью потреблён.
    fn path_done(&self) -> bool {
        self.pos >= self.path.len()
    }

    /// Продвигает курсор сразу за ближайшую `]`.
    fn skip_past_bracket(&mut self) {
        while self.pos < self.path.len() && self.path[self.pos] != b']' {
            self.pos += 1;
        }
        if self.pos < self.path.len() {
            self.pos += 1;
        }
    }
}

impl<'p> Emit for FindState<'p> {
    fn event(&mut self, ev: Event<'_>) -> bool {
        if self.hit.is_some() {
            return false;
        }
        match ev {
            Event::ObjectBegin { offset } => {
                if self.path_done() && self.current == self.target {
                    self.container = Some(offset);
                }
                self.current += 1;
            }
            Event::ArrayBegin { offset } => {
                if self.current == self.target
                    && self.path.get(self.pos) == Some(&b'[')
                {
                    self.seen = 0;
                    self.want = parse_index(self.path, self.pos + 1);
                    if self.seen == self.want {
                        self.target += 1;
                        self.skip_past_bracket();
                    }
                }
                if self.path_done() && self.current == self.target {
                    self.container = Some(offset);
                }
                self.current += 1;
            }
            Event::Comma { .. } => {
                if self.current == self.target + 1 {
                    self.seen += 1;
                    if self.seen == self.want {
                        self.skip_past_bracket();
                        self.target += 1;
                    }
                }
            }
            Event::Key(tok) => {
                if self.current == self.target + 1
                    && self.path.get(self.pos) == Some(&b'.')
                {
                    let key = &tok.bytes[1..tok.bytes.len() - 1];
                    if let Some(end) =
                        component_match(self.path, self.pos + 1, key)
                    {
                        self.target += 1;
                        self.pos = end;
                    }
                }
            }
            Event::ObjectEnd { offset } | Event::ArrayEnd { offset } => {
                self.current -= 1;
                if self.path_done() && self.current == self.target {
                    if let Some(start) = self.container {
                        let kind = match ev {
                            Event::ObjectEnd { .. } => TokenKind::Object,
                            _ => TokenKind::Array,
                        };
                        self.hit = Some((kind, start, offset - start + 1));
                    }
                }
            }
            Event::Value(tok) => {
                if self.path_done() && self.current == self.target {
                    self.hit =
                        Some((tok.kind, tok.offset, tok.bytes.len()));
                }
            }
            Event::Colon { .. } => {}
        }
        self.hit.is_none()
    }
}

/// Разбирает десятичный индекс массива, начиная с `pos`.
fn parse_index(path: &[u8], mut pos: usize) -> i64 {
    let mut idx: i64 = 0;
    while pos < path.len() && path[pos].is_ascii_digit() {
        idx = idx.saturating_mul(10).saturating_add((path[pos] - b'0') as i64);
        pos += 1;
    }
    idx
}

/// Сравнивает компонент пути, начинающийся с `pos`, с сырыми байтами
/// ключа. Компонент завершается первым неэкранированным `.` или `[`;
/// `\.`, `\[`, `\]` и `\\` в пути означают соответствующий байт
/// буквально. При точном совпадении возвращает позицию терминатора.
fn component_match(path: &[u8], mut pos: usize, key: &[u8]) -> Option<usize> {
    let mut k = 0;
    loop {
        if pos >= path.len()
            || path[pos] == b'.'
            || path[pos] == b'['
        {
            return if k == key.len() { Some(pos) } else { None };
        }
        let (lit, adv) = if path[pos] == b'\\'
            && pos + 1 < path.len()
            && matches!(path[pos + 1], b'.' | b'[' | b']' | b'\\')
        {
            (path[pos + 1], 2)
        } else {
            (path[pos], 1)
        };
        if k >= key.len() || key[k] != lit {
            return None;
        }
        pos += adv;
        k += 1;
    }
}

/// Ищет значение по селектору со сканером по умолчанию.
///
/// Возвращает первое совпадение в порядке документа; `None` означает
/// «не найдено либо путь некорректен». Ошибка разбора после точки
/// совпадения значения не отменяет: проход обрывается, как только
/// совпадение записано.
///
/// # Пример
///
/// ```
/// use sift_scanner::{find, TokenKind};
///
/// let doc = b"{\"a\":{\"c\":null},\"c\":2}";
/// let found = find(doc, "$.a.c").unwrap();
/// assert_eq!(found.kind, TokenKind::Null);
/// assert_eq!(found.bytes, b"null");
/// ```
pub fn find<'a>(src: &'a [u8], path: &str) -> Option<Found<'a>> {
    Scanner::new().find(src, path)
}

impl Scanner {
    /// Ищет значение по селектору, используя этот сканер.
    ///
    /// См. свободную функцию [`find`].
    pub fn find<'a>(&self, src: &'a [u8], path: &str) -> Option<Found<'a>> {
        if !path.starts_with('$') {
            log::debug!("selector {:?} does not start with '$'", path);
            return None;
        }
        let path = path.as_bytes();
        let mut state = FindState::new(path);
        // Ошибка сканирования до совпадения означает «не найдено», а
        // после совпадения невозможна: селектор останавливает проход.
        let _ = self.scan(src, &mut state);
        state.hit.map(|(kind, offset, len)| Found {
            kind,
            bytes: &src[offset..offset + len],
            offset,
        })
    }
}
