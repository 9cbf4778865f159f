use crate::ParseError;

/// Предел вложенности по умолчанию.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Вид токена JSON.
///
/// Сканер передаёт токены [`TokenKind::Key`] и скалярные значения;
/// [`TokenKind::Array`] и [`TokenKind::Object`] синтезируются селектором
/// для составных совпадений, чей срез покрывает весь текст в скобках
/// включительно.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// Ключ объекта (срез включает окружающие кавычки).
    Key,
    /// Строка (срез включает окружающие кавычки).
    String,
    /// Числовой литерал.
    Number,
    /// Литерал `true`.
    True,
    /// Литерал `false`.
    False,
    /// Литерал `null`.
    Null,
    /// Массив целиком, от `[` до `]`.
    Array,
    /// Объект целиком, от `{` до `}`.
    Object,
}

impl TokenKind {
    /// Возвращает true тогда и только тогда, когда это вид скалярного
    /// значения: строка, число, `true`, `false` или `null`.
    pub fn is_scalar_value(&self) -> bool {
        matches!(
            *self,
            TokenKind::String
                | TokenKind::Number
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }
}

/// Один распознанный токен.
///
/// `bytes` — это всегда подсрез входного буфера, переданного в
/// [`Scanner::scan`], а `offset` — его позиция в этом буфере.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Token<'a> {
    /// Вид токена.
    pub kind: TokenKind,
    /// Точный текст токена внутри входных данных.
    pub bytes: &'a [u8],
    /// Смещение токена от начала входных данных.
    pub offset: usize,
}

impl<'a> std::fmt::Debug for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use bstr::ByteSlice;

        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.as_bstr())
            .field("offset", &self.offset)
            .finish()
    }
}

/// Событие сканера.
///
/// Для каждого распознанного токена и каждого структурного байта сканер
/// вызывает [`Emit::event`] ровно один раз, в порядке документа.
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    /// Открывающая `{`.
    ObjectBegin {
        /// Смещение байта `{`.
        offset: usize,
    },
    /// Закрывающая `}`.
    ObjectEnd {
        /// Смещение байта `}`.
        offset: usize,
    },
    /// Открывающая `[`.
    ArrayBegin {
        /// Смещение байта `[`.
        offset: usize,
    },
    /// Закрывающая `]`.
    ArrayEnd {
        /// Смещение байта `]`.
        offset: usize,
    },
    /// Запятая между элементами контейнера.
    Comma {
        /// Смещение байта `,`.
        offset: usize,
    },
    /// Двоеточие между ключом и значением.
    Colon {
        /// Смещение байта `:`.
        offset: usize,
    },
    /// Ключ объекта.
    Key(Token<'a>),
    /// Скалярное значение.
    Value(Token<'a>),
}

/// Трейт для получения событий сканера.
///
/// Возврат `false` из [`Emit::event`] досрочно останавливает сканирование:
/// [`Scanner::scan`] возвращает `Ok` со смещением сразу за последним
/// доставленным событием. Так селектор обрывает проход, как только
/// совпадение найдено.
pub trait Emit {
    /// Обрабатывает одно событие. Возврат `false` останавливает сканер.
    fn event(&mut self, ev: Event<'_>) -> bool;
}

/// Реализация [`Emit`], игнорирующая все события.
///
/// Используется для чистой проверки входа, когда сами токены не нужны.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ignore;

impl Emit for Ignore {
    fn event(&mut self, _: Event<'_>) -> bool {
        true
    }
}

/// Обёртка, позволяющая использовать замыкание как [`Emit`].
///
/// # Пример
///
/// ```
/// use sift_scanner::{EmitFn, Event, Scanner};
///
/// let mut values = 0;
/// Scanner::new()
///     .scan(b"[1,2,3]", &mut EmitFn(|ev: Event<'_>| {
///         if let Event::Value(_) = ev {
///             values += 1;
///         }
///         true
///     }))
///     .unwrap();
/// assert_eq!(values, 3);
/// ```
#[derive(Clone, Debug)]
pub struct EmitFn<F>(pub F);

impl<F: FnMut(Event<'_>) -> bool> Emit for EmitFn<F> {
    fn event(&mut self, ev: Event<'_>) -> bool {
        (self.0)(ev)
    }
}

/// Конфигурация сканера.
#[derive(Clone, Debug)]
struct Config {
    /// Предел вложенности контейнеров.
    max_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// Построитель сканера.
///
/// Единственная настройка — предел вложенности: глубина, на которой
/// сканер отказывает с ошибкой [`ParseErrorKind::TooDeep`]. Вложенность
/// ровно в предел принимается; на один уровень больше — нет.
///
/// [`ParseErrorKind::TooDeep`]: crate::ParseErrorKind::TooDeep
#[derive(Clone, Debug, Default)]
pub struct ScannerBuilder {
    config: Config,
}

impl ScannerBuilder {
    /// Создать новый построитель сканера с конфигурацией по умолчанию.
    pub fn new() -> ScannerBuilder {
        ScannerBuilder { config: Config::default() }
    }

    /// Построить сканер.
    pub fn build(&self) -> Scanner {
        Scanner { config: self.config.clone() }
    }

    /// Устанавливает предел вложенности. По умолчанию
    /// [`DEFAULT_MAX_DEPTH`].
    pub fn max_depth(&mut self, depth: usize) -> &mut ScannerBuilder {
        self.config.max_depth = depth;
        self
    }
}

/// Потоковый сканер JSON.
///
/// Сканер проверяет байтовый срез как одно значение JSON и передаёт
/// события токенов. Он не хранит состояния между вызовами и не пишет во
/// входной буфер, поэтому один экземпляр можно свободно переиспользовать.
#[derive(Clone, Debug)]
pub struct Scanner {
    config: Config,
}

/// Состояние конечного автомата сканера.
#[derive(Clone, Copy, Debug)]
enum State {
    /// Ожидается значение.
    Value,
    /// Ожидается ключ объекта или `}`.
    Key,
    /// Ожидается `:` после ключа.
    Colon,
    /// Ожидается `,` или закрывающая скобка.
    CommaOrClose,
}

impl Default for Scanner {
    fn default() -> Scanner {
        Scanner::new()
    }
}

impl Scanner {
    /// Создать сканер с конфигурацией по умолчанию.
    pub fn new() -> Scanner {
        ScannerBuilder::new().build()
    }

    /// Возвращает настроенный предел вложенности.
    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    /// Сканирует `src` как одно значение JSON, передавая события в `emit`.
    ///
    /// При успехе возвращает число потреблённых байтов: хвостовые пробелы
    /// не потребляются, и любой текст после внешнего значения остаётся
    /// нетронутым. Если `emit` досрочно остановил проход, возвращается
    /// смещение сразу за последним доставленным событием.
    pub fn scan<E: Emit>(
        &self,
        src: &[u8],
        emit: &mut E,
    ) -> Result<usize, ParseError> {
        let mut state = State::Value;
        let mut nesting: Vec<u8> = Vec::with_capacity(self.config.max_depth);
        let mut i = 0;
        while i < src.len() {
            let c = src[i];
            if matches!(c, b' ' | b'\t' | b'\n' | b'\r') {
                i += 1;
                continue;
            }
            match state {
                State::Value => {
                    let token = match c {
                        b'{' | b'[' => {
                            if nesting.len() >= self.config.max_depth {
                                return Err(ParseError::too_deep(i));
                            }
                            nesting.push(c);
                            let ev = if c == b'{' {
                                state = State::Key;
                                Event::ObjectBegin { offset: i }
                            } else {
                                Event::ArrayBegin { offset: i }
                            };
                            if !emit.event(ev) {
                                return Ok(i + 1);
                            }
                            i += 1;
                            continue;
                        }
                        b']' if !nesting.is_empty() => {
                            // Пустой массив.
                            match self.close(i, c, &mut nesting, emit)? {
                                Some(end) => return Ok(end),
                                None => {
                                    state = State::CommaOrClose;
                                    i += 1;
                                    continue;
                                }
                            }
                        }
                        b't' => literal(src, i, b"true", TokenKind::True)?,
                        b'f' => literal(src, i, b"false", TokenKind::False)?,
                        b'n' => literal(src, i, b"null", TokenKind::Null)?,
                        b'-' | b'0'..=b'9' => number(src, i)?,
                        b'"' => string(src, i, TokenKind::String)?,
                        _ => return Err(ParseError::syntax(i)),
                    };
                    let end = token.offset + token.bytes.len();
                    let keep_going = emit.event(Event::Value(token));
                    if nesting.is_empty() || !keep_going {
                        return Ok(end);
                    }
                    state = State::CommaOrClose;
                    i = end;
                }
                State::Key => match c {
                    b'"' => {
                        let token = string(src, i, TokenKind::Key)?;
                        let end = token.offset + token.bytes.len();
                        if !emit.event(Event::Key(token)) {
                            return Ok(end);
                        }
                        state = State::Colon;
                        i = end;
                    }
                    b'}' => {
                        // Пустой объект.
                        match self.close(i, c, &mut nesting, emit)? {
                            Some(end) => return Ok(end),
                            None => {
                                state = State::CommaOrClose;
                                i += 1;
                            }
                        }
                    }
                    _ => return Err(ParseError::syntax(i)),
                },
                State::Colon => {
                    if c != b':' {
                        return Err(ParseError::syntax(i));
                    }
                    if !emit.event(Event::Colon { offset: i }) {
                        return Ok(i + 1);
                    }
                    state = State::Value;
                    i += 1;
                }
                State::CommaOrClose => match c {
                    b',' if !nesting.is_empty() => {
                        state = if nesting.last() == Some(&b'{') {
                            State::Key
                        } else {
                            State::Value
                        };
                        if !emit.event(Event::Comma { offset: i }) {
                            return Ok(i + 1);
                        }
                        i += 1;
                    }
                    b']' | b'}' if !nesting.is_empty() => {
                        match self.close(i, c, &mut nesting, emit)? {
                            Some(end) => return Ok(end),
                            None => i += 1,
                        }
                    }
                    _ => return Err(ParseError::syntax(i)),
                },
            }
        }
        // Вход закончился раньше, чем внешнее значение.
        Err(ParseError::syntax(src.len()))
    }

    /// Обрабатывает закрывающую скобку. Возвращает `Some(consumed)`, когда
    /// сканирование завершено (глубина вернулась к нулю или получатель
    /// остановил проход), и `None`, когда нужно продолжать.
    fn close<E: Emit>(
        &self,
        i: usize,
        c: u8,
        nesting: &mut Vec<u8>,
        emit: &mut E,
    ) -> Result<Option<usize>, ParseError> {
        // В таблице ASCII расстояние между `[` и `]` равно 2. То же для
        // `{` и `}`.
        let opener = match nesting.pop() {
            Some(b) => b,
            None => return Err(ParseError::syntax(i)),
        };
        if c != opener + 2 {
            return Err(ParseError::syntax(i));
        }
        let ev = if c == b'}' {
            Event::ObjectEnd { offset: i }
        } else {
            Event::ArrayEnd { offset: i }
        };
        let keep_going = emit.event(ev);
        if nesting.is_empty() || !keep_going {
            Ok(Some(i + 1))
        } else {
            Ok(None)
        }
    }
}

/// Сканирует `src` как одно значение JSON со сканером по умолчанию,
/// игнорируя события. Возвращает число потреблённых байтов.
///
/// # Пример
///
/// ```
/// use sift_scanner::scan;
///
/// assert_eq!(scan(b"[1, 2, null]").unwrap(), 12);
/// assert!(scan(b"[1, 2").is_err());
/// ```
pub fn scan(src: &[u8]) -> Result<usize, ParseError> {
    Scanner::new().scan(src, &mut Ignore)
}

/// Распознаёт литерал `true`/`false`/`null` с точной проверкой длины.
fn literal<'s>(
    src: &'s [u8],
    i: usize,
    lit: &[u8],
    kind: TokenKind,
) -> Result<Token<'s>, ParseError> {
    if src.len() - i >= lit.len() && &src[i..i + lit.len()] == lit {
        Ok(Token { kind, bytes: &src[i..i + lit.len()], offset: i })
    } else {
        Err(ParseError::syntax(i))
    }
}

/// Отмеряет протяжённость числового литерала: знак, целая часть, дробная
/// часть, экспонента. Экспонента без цифр не потребляется, как и у
/// стандартного десятичного разбора с откатом.
fn number<'s>(src: &'s [u8], i: usize) -> Result<Token<'s>, ParseError> {
    let mut j = i;
    if src[j] == b'-' {
        j += 1;
    }
    let int_digits = digits(src, j);
    j += int_digits;
    let mut any = int_digits > 0;
    if j < src.len() && src[j] == b'.' {
        j += 1;
        let frac_digits = digits(src, j);
        j += frac_digits;
        any = any || frac_digits > 0;
    }
    if !any {
        return Err(ParseError::syntax(i));
    }
    if j < src.len() && (src[j] == b'e' || src[j] == b'E') {
        let mut k = j + 1;
        if k < src.len() && (src[k] == b'+' || src[k] == b'-') {
            k += 1;
        }
        let exp_digits = digits(src, k);
        if exp_digits > 0 {
            j = k + exp_digits;
        }
    }
    Ok(Token { kind: TokenKind::Number, bytes: &src[i..j], offset: i })
}

/// Считает подряд идущие ASCII-цифры, начиная с `i`.
fn digits(src: &[u8], i: usize) -> usize {
    src[i..].iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Распознаёт строковый токен, начинающийся с кавычки в `src[i]`.
fn string<'s>(
    src: &'s [u8],
    i: usize,
    kind: TokenKind,
) -> Result<Token<'s>, ParseError> {
    let n = pass_string(&src[i + 1..])
        .map_err(|off| ParseError::syntax(i + 1 + off))?;
    Ok(Token { kind, bytes: &src[i..i + n + 2], offset: i })
}

/// Общий строковый под-сканер: возвращает позицию закрывающей кавычки
/// внутри `s` (тела строки без открывающей кавычки) либо смещение
/// нарушающего байта.
///
/// Неизвестная escape-последовательность не является ошибкой на этом
/// уровне: обратная косая черта рассматривается как обычный байт, и
/// `\uXXXX` проходит без декодирования. NUL внутри строки — ошибка.
pub(crate) fn pass_string(s: &[u8]) -> Result<usize, usize> {
    let mut i = 0;
    while i < s.len() {
        match memchr::memchr3(b'"', b'\\', b'\0', &s[i..]) {
            None => break,
            Some(off) => {
                let j = i + off;
                match s[j] {
                    b'"' => return Ok(j),
                    b'\0' => return Err(j),
                    _ => {
                        if j + 1 < s.len() && is_escape_char(s[j + 1]) {
                            i = j + 2;
                        } else {
                            i = j + 1;
                        }
                    }
                }
            }
        }
    }
    Err(s.len())
}

/// Допустимые escape-символы при сканировании строки.
fn is_escape_char(c: u8) -> bool {
    matches!(c, b'b' | b'f' | b'n' | b'r' | b't' | b'\\' | b'"' | b'/')
}
