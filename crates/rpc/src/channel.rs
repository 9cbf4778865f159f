use sift_printer::{Arg, Sink, format, write_quoted};
use sift_scanner::{find, get_string};

use crate::glob;

/// Код ошибки JSON-RPC: получен некорректный JSON.
pub const ERROR_INVALID: i32 = -32700;
/// Код ошибки JSON-RPC: метод не существует.
pub const ERROR_NOT_FOUND: i32 = -32601;
/// Код ошибки JSON-RPC: некорректные параметры.
pub const ERROR_BAD_PARAMS: i32 = -32602;
/// Код ошибки JSON-RPC: внутренняя ошибка.
pub const ERROR_INTERNAL: i32 = -32603;

/// Каноническое имя встроенного метода, перечисляющего реестр.
pub const DEFAULT_LIST_METHOD: &str = "rpc.list";

/// Ёмкость приёмного буфера по умолчанию.
pub const DEFAULT_RECV_CAPACITY: usize = 256;

/// Предел длины имени метода после раскрытия escape-последовательностей.
/// Кадр с более длинным именем отвергается как некорректный.
const METHOD_BUF_SIZE: usize = 64;

type Handler = Box<dyn FnMut(&mut Request<'_, '_>)>;
type ResponseHandler = Box<dyn FnMut(&[u8])>;

/// Обработчик зарегистрированного метода.
enum Callback {
    /// Встроенный `rpc.list`: отвечает списком шаблонов реестра.
    List,
    /// Пользовательский обработчик.
    User(Handler),
}

/// Запись реестра методов.
struct Method {
    pattern: String,
    callback: Callback,
}

/// Запрос, переданный обработчику метода.
///
/// `params` и `id` — сырые срезы входного кадра; ответы уходят в
/// приёмник, с которым был вызван [`Channel::process`]. Состояние,
/// которое C-версия передавала через `user_data`, в Rust захватывается
/// замыканием обработчика.
pub struct Request<'a, 's> {
    params: &'a [u8],
    id: &'a [u8],
    sink: &'s mut dyn Sink,
}

impl<'a, 's> Request<'a, 's> {
    /// Сырой срез `params` кадра; пуст, если параметры отсутствуют.
    pub fn params(&self) -> &'a [u8] {
        self.params
    }

    /// Сырой срез `id` кадра; пуст для уведомлений.
    pub fn id(&self) -> &'a [u8] {
        self.id
    }

    /// Возвращает true, если кадр — уведомление (без `id`): ответы на
    /// него не пишутся.
    pub fn is_notification(&self) -> bool {
        self.id.is_empty()
    }

    /// Отправляет успешный ответ `{"id":<id>,"result":<...>}`.
    ///
    /// `None` раскрывается в `result:null`. Для уведомления не пишется
    /// ничего. Возвращает число принятых приёмником байтов.
    pub fn reply(&mut self, result: Option<(&str, &[Arg<'_>])>) -> usize {
        if self.id.is_empty() {
            return 0;
        }
        let mut n = format(
            self.sink,
            "{\"id\":%.*s,\"result\":",
            &[Arg::Raw(self.id)],
        );
        n += match result {
            Some((fmt, args)) => format(self.sink, fmt, args),
            None => self.sink.write(b"null"),
        };
        n + self.sink.write(b"}\n")
    }

    /// Отправляет ответ с ошибкой
    /// `{"id":<id>,"error":{"code":<code>,"message":<...>[,"data":<...>]}}`.
    ///
    /// Сообщение всегда печатается строкой в кавычках; член `data`
    /// опускается при `None`. Для уведомления не пишется ничего.
    /// Прикладные коды выбираются вне зарезервированного диапазона
    /// JSON-RPC (например, не выше −32000).
    pub fn reply_error(
        &mut self,
        code: i32,
        message: &str,
        data: Option<(&str, &[Arg<'_>])>,
    ) -> usize {
        if self.id.is_empty() {
            return 0;
        }
        let mut n = format(
            self.sink,
            "{\"id\":%.*s,\"error\":{\"code\":%d,\"message\":%Q",
            &[Arg::Raw(self.id), Arg::Int(code as i64), Arg::Quoted(message)],
        );
        if let Some((fmt, args)) = data {
            n += self.sink.write(b",\"data\":");
            n += format(self.sink, fmt, args);
        }
        n + self.sink.write(b"}}\n")
    }
}

/// Конфигурация канала.
#[derive(Clone, Debug)]
struct Config {
    /// Ёмкость приёмного буфера.
    recv_capacity: usize,
    /// Имя встроенного списочного метода; пустая строка отключает его.
    list_method: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            recv_capacity: DEFAULT_RECV_CAPACITY,
            list_method: DEFAULT_LIST_METHOD.to_string(),
        }
    }
}

/// Построитель канала.
///
/// # Пример
///
/// ```
/// use sift_rpc::Channel;
///
/// let mut channel = Channel::builder()
///     .recv_capacity(512)
///     .on_response(|frame| println!("got {} bytes", frame.len()))
///     .build();
/// channel.export("ping", |req| {
///     req.reply(None);
/// });
/// ```
#[derive(Default)]
pub struct ChannelBuilder {
    config: Config,
    response: Option<ResponseHandler>,
}

impl std::fmt::Debug for ChannelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBuilder")
            .field("config", &self.config)
            .field("response", &self.response.is_some())
            .finish()
    }
}

impl ChannelBuilder {
    /// Создать новый построитель канала с конфигурацией по умолчанию.
    pub fn new() -> ChannelBuilder {
        ChannelBuilder::default()
    }

    /// Устанавливает ёмкость приёмного буфера. По умолчанию
    /// [`DEFAULT_RECV_CAPACITY`]. Накопленный кадр, не уместившийся в
    /// буфер, молча отбрасывается — осознанное ограничение для
    /// встраиваемых применений.
    pub fn recv_capacity(mut self, capacity: usize) -> ChannelBuilder {
        self.config.recv_capacity = capacity;
        self
    }

    /// Переименовывает встроенный списочный метод. По умолчанию
    /// [`DEFAULT_LIST_METHOD`]; пустое имя отключает регистрацию.
    pub fn list_method(mut self, name: &str) -> ChannelBuilder {
        self.config.list_method = name.to_string();
        self
    }

    /// Устанавливает обработчик ответных кадров: он получает кадр,
    /// содержащий `result` или `error`, целиком и в сыром виде.
    pub fn on_response<F>(mut self, handler: F) -> ChannelBuilder
    where
        F: FnMut(&[u8]) + 'static,
    {
        self.response = Some(Box::new(handler));
        self
    }

    /// Построить канал.
    pub fn build(self) -> Channel {
        let mut methods = Vec::new();
        if !self.config.list_method.is_empty() {
            methods.push(Method {
                pattern: self.config.list_method.clone(),
                callback: Callback::List,
            });
        }
        Channel {
            recv: Vec::with_capacity(self.config.recv_capacity),
            config: self.config,
            methods,
            response: self.response,
        }
    }
}

/// Один двунаправленный канал JSON-RPC 2.0.
///
/// Канал накапливает байты до разделителя `\n`, классифицирует кадр как
/// запрос или ответ, диспетчеризует запросы по реестру методов и
/// передаёт ответы обработчику ответных кадров. Канал не синхронизирован
/// внутренне: он принадлежит одному потоку, все вызовы выполняются до
/// завершения (см. одноимённые гарантии упорядочивания в документации
/// [`Channel::process`]).
pub struct Channel {
    config: Config,
    methods: Vec<Method>,
    response: Option<ResponseHandler>,
    recv: Vec<u8>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.config)
            .field(
                "methods",
                &self
                    .methods
                    .iter()
                    .map(|m| m.pattern.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("buffered", &self.recv.len())
            .finish()
    }
}

impl Default for Channel {
    fn default() -> Channel {
        Channel::new()
    }
}

impl Channel {
    /// Создать канал с конфигурацией по умолчанию.
    pub fn new() -> Channel {
        ChannelBuilder::new().build()
    }

    /// Создать новый [`ChannelBuilder`].
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    /// Регистрирует метод под glob-шаблоном имени (см. [`crate::glob`]).
    ///
    /// Новые записи добавляются в голову реестра, поэтому диспетчеризация
    /// видит их первыми; при пересечении шаблонов побеждает
    /// зарегистрированный последним. Снятие регистрации не
    /// предусмотрено: методы живут до конца жизни канала.
    pub fn export<F>(&mut self, pattern: &str, handler: F)
    where
        F: FnMut(&mut Request<'_, '_>) + 'static,
    {
        self.methods.insert(
            0,
            Method {
                pattern: pattern.to_string(),
                callback: Callback::User(Box::new(handler)),
            },
        );
    }

    /// Возвращает шаблоны зарегистрированных методов в порядке
    /// диспетчеризации.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.pattern.as_str())
    }

    /// Принимает один байт канала.
    ///
    /// Перевод строки завершает кадр: накопленное диспетчеризуется через
    /// [`Channel::process`], и буфер очищается. Полный кадр всегда
    /// диспетчеризуется до приёма следующего байта. При переполнении
    /// буфера частичный кадр молча отбрасывается, и накопление
    /// начинается заново.
    pub fn process_byte(&mut self, byte: u8, sink: &mut dyn Sink) {
        if byte == b'\n' {
            if self.recv.len() > 1 {
                let buf = std::mem::take(&mut self.recv);
                self.process(&buf, sink);
                self.recv = buf;
            }
            self.recv.clear();
        } else if self.recv.len() == self.config.recv_capacity {
            log::debug!(
                "receive buffer overflow, dropping {} bytes",
                self.recv.len(),
            );
            self.recv.clear();
        } else {
            self.recv.push(byte);
        }
    }

    /// Обрабатывает один кадр.
    ///
    /// Кадр с `result` или `error` — ответ: он передаётся обработчику
    /// ответных кадров, в приёмник не пишется ничего. Иначе `method`
    /// обязан быть строкой; кадр без него отвергается кадром ошибки
    /// `-32700`, цитирующим вход. Реестр обходится в порядке
    /// диспетчеризации, побеждает первый подошедший шаблон, и метод
    /// вызывается не более одного раза на кадр. Без совпадения ответ
    /// `-32601` пишется только если кадр нёс `id`.
    pub fn process(&mut self, frame: &[u8], sink: &mut dyn Sink) {
        if find(frame, "$.result").is_some() || find(frame, "$.error").is_some()
        {
            if let Some(ref mut handler) = self.response {
                handler(frame);
            }
            return;
        }

        let mut method_buf = [0u8; METHOD_BUF_SIZE];
        let method_len =
            match get_string(frame, "$.method", &mut method_buf) {
                Ok(n) if n > 0 => n,
                _ => {
                    format(
                        sink,
                        "{\"error\":{\"code\":%d,\"message\":%.*Q}}",
                        &[
                            Arg::Int(ERROR_INVALID as i64),
                            Arg::QuotedBytes(frame),
                        ],
                    );
                    sink.write(b"\n");
                    self.recv.clear();
                    return;
                }
            };
        let method = &method_buf[..method_len];

        let id = find(frame, "$.id").map_or(&b""[..], |f| f.bytes);
        let params = find(frame, "$.params").map_or(&b""[..], |f| f.bytes);

        let hit = self
            .methods
            .iter()
            .position(|m| glob::matches(m.pattern.as_bytes(), method));
        let mut req = Request { params, id, sink };
        match hit {
            None => {
                req.reply_error(ERROR_NOT_FOUND, "method not found", None);
            }
            Some(idx) => {
                if matches!(self.methods[idx].callback, Callback::List) {
                    let methods = &self.methods;
                    let list = |sink: &mut dyn Sink| -> usize {
                        let mut n = 0;
                        for (i, m) in methods.iter().enumerate() {
                            if i > 0 {
                                n += sink.write(b",");
                            }
                            n += write_quoted(sink, m.pattern.as_bytes());
                        }
                        n
                    };
                    req.reply(Some(("[%M]", &[Arg::Nested(&list)])));
                } else if let Callback::User(ref mut handler) =
                    self.methods[idx].callback
                {
                    handler(&mut req);
                }
            }
        }
    }
}

/// Раскрывает формат в приёмник и добавляет завершающий `\n`.
///
/// Используется для исходящих уведомлений и запросов; возвращает число
/// принятых приёмником байтов, включая разделитель кадра.
///
/// # Пример
///
/// ```
/// use sift_printer::Arg;
/// use sift_rpc::call;
///
/// let mut out = vec![];
/// call(&mut out, "{%Q:%Q,%Q:[%d]}", &[
///     Arg::Quoted("method"),
///     Arg::Quoted("sum"),
///     Arg::Quoted("params"),
///     Arg::Int(7),
/// ]);
/// assert_eq!(out, b"{\"method\":\"sum\",\"params\":[7]}\n");
/// ```
pub fn call(sink: &mut dyn Sink, fmt: &str, args: &[Arg<'_>]) -> usize {
    let n = format(sink, fmt, args);
    n + sink.write(b"\n")
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use sift_printer::Arg;
    use sift_scanner::get_number;

    use super::{Channel, call};

    fn process_str(channel: &mut Channel, frame: &str) -> String {
        let mut out = vec![];
        channel.process(frame.as_bytes(), &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn list_builtin() {
        let mut channel = Channel::new();
        assert_eq!(
            process_str(&mut channel, "{\"id\": 1, \"method\": \"rpc.list\"}"),
            "{\"id\":1,\"result\":[\"rpc.list\"]}\n",
        );

        // Новые методы попадают в голову реестра и списка.
        channel.export("foo", |req| {
            req.reply(None);
        });
        assert_eq!(
            process_str(&mut channel, "{\"id\": 1, \"method\": \"rpc.list\"}"),
            "{\"id\":1,\"result\":[\"foo\",\"rpc.list\"]}\n",
        );
    }

    #[test]
    fn unknown_method() {
        let mut channel = Channel::new();
        assert_eq!(
            process_str(&mut channel, "{\"id\": 1, \"method\": \"foo\"}\n"),
            "{\"id\":1,\"error\":{\"code\":-32601,\"message\":\"method not \
             found\"}}\n",
        );
    }

    #[test]
    fn dispatch_with_params_and_captured_state() {
        let mut channel = Channel::new();
        // Состояние, которое C-версия передавала через user_data,
        // захватывается замыканием.
        let userdata = "hi";
        channel.export("foo", move |req| {
            let v = get_number(req.params(), "$[1]").unwrap_or(0.0);
            req.reply(Some((
                "{%Q:%g,%Q:%Q}",
                &[
                    Arg::Quoted("x"),
                    Arg::Double(v),
                    Arg::Quoted("ud"),
                    Arg::Quoted(userdata),
                ],
            )));
        });
        assert_eq!(
            process_str(
                &mut channel,
                "{\"id\": 2, \"method\": \"foo\",\"params\":[0,1.23]}\n",
            ),
            "{\"id\":2,\"result\":{\"x\":1.23,\"ud\":\"hi\"}}\n",
        );
    }

    #[test]
    fn bad_frame() {
        let mut channel = Channel::new();
        assert_eq!(
            process_str(&mut channel, "boo"),
            "{\"error\":{\"code\":-32700,\"message\":\"boo\"}}\n",
        );
        // Метод обязан быть строкой.
        assert_eq!(
            process_str(&mut channel, "{\"id\":1,\"method\":123}"),
            "{\"error\":{\"code\":-32700,\"message\":\
             \"{\\\"id\\\":1,\\\"method\\\":123}\"}}\n",
        );
    }

    #[test]
    fn error_replies() {
        let mut channel = Channel::new();
        channel.export("foo1", |req| {
            req.reply_error(123, "", None);
        });
        channel.export("foo2", |req| {
            let params = req.params().to_vec();
            req.reply_error(
                456,
                "qwerty",
                Some(("%.*s", &[Arg::Raw(&params)])),
            );
        });

        assert_eq!(
            process_str(
                &mut channel,
                "{\"id\": 3, \"method\": \"foo1\",\"params\":[1,true]}\n",
            ),
            "{\"id\":3,\"error\":{\"code\":123,\"message\":\"\"}}\n",
        );
        assert_eq!(
            process_str(
                &mut channel,
                "{\"id\": 4, \"method\": \"foo2\",\"params\":[1,true]}\n",
            ),
            "{\"id\":4,\"error\":{\"code\":456,\"message\":\"qwerty\",\
             \"data\":[1,true]}}\n",
        );
    }

    #[test]
    fn notifications_produce_no_reply() {
        let mut channel = Channel::new();
        let calls = Rc::new(RefCell::new(0));
        let seen = Rc::clone(&calls);
        channel.export("ping", move |req| {
            *seen.borrow_mut() += 1;
            assert!(req.is_notification());
            req.reply(None);
            req.reply_error(1, "x", None);
        });

        // Незарегистрированное уведомление тоже молчит.
        assert_eq!(
            process_str(
                &mut channel,
                "{\"method\": \"pong\",\"params\":[1,true]}\n",
            ),
            "",
        );
        // Обработчик вызывается, но ответы подавлены.
        assert_eq!(
            process_str(&mut channel, "{\"method\": \"ping\"}\n"),
            "",
        );
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn response_frames_go_to_handler() {
        let responses = Rc::new(RefCell::new(Vec::<Vec<u8>>::new()));
        let sink_side = Rc::clone(&responses);
        let mut channel = Channel::builder()
            .on_response(move |frame| {
                sink_side.borrow_mut().push(frame.to_vec());
            })
            .build();

        // Кадр с result и кадр только с error — оба ответы; в приёмник
        // не пишется ничего.
        assert_eq!(
            process_str(&mut channel, "{\"id\":123,\"result\":[1,2,3]}"),
            "",
        );
        assert_eq!(
            process_str(&mut channel, "{\"id\":566,\"error\":{}}"),
            "",
        );
        let got = responses.borrow();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], b"{\"id\":123,\"result\":[1,2,3]}");
        assert_eq!(got[1], b"{\"id\":566,\"error\":{}}");
    }

    #[test]
    fn response_without_handler_is_dropped() {
        let mut channel = Channel::new();
        assert_eq!(
            process_str(&mut channel, "{\"id\":123,\"result\":777}"),
            "",
        );
    }

    #[test]
    fn glob_patterns_in_method_names() {
        let mut channel = Channel::new();
        channel.export("Bar.*", |req| {
            let params = req.params().to_vec();
            req.reply(Some(("%.*s", &[Arg::Raw(&params)])));
        });
        assert_eq!(
            process_str(
                &mut channel,
                "{\"id\":777,\"method\":\"Bar.Baz\",\"params\":[true]}",
            ),
            "{\"id\":777,\"result\":[true]}\n",
        );

        // При пересечении шаблонов побеждает зарегистрированный последним,
        // и метод вызывается не более одного раза на кадр.
        let hits = Rc::new(RefCell::new(Vec::<&str>::new()));
        let wide = Rc::clone(&hits);
        channel.export("Bar.#", move |req| {
            wide.borrow_mut().push("wide");
            req.reply(Some(("%d", &[Arg::Int(2)])));
        });
        assert_eq!(
            process_str(&mut channel, "{\"id\":8,\"method\":\"Bar.Quux\"}"),
            "{\"id\":8,\"result\":2}\n",
        );
        assert_eq!(*hits.borrow(), vec!["wide"]);
    }

    #[test]
    fn byte_accumulator_frames_and_resets() {
        let mut channel = Channel::new();
        let mut out = vec![];
        for b in b"{\"id\":1,\"method\":\"rpc.list\"}\n" {
            channel.process_byte(*b, &mut out);
        }
        assert_eq!(out, b"{\"id\":1,\"result\":[\"rpc.list\"]}\n");

        // Кадр всегда диспетчеризуется до приёма следующего байта.
        out.clear();
        for b in b"{\"method\":\"x\"}\n{\"id\":9,\"method\":\"rpc.list\"}\n" {
            channel.process_byte(*b, &mut out);
        }
        assert_eq!(out, b"{\"id\":9,\"result\":[\"rpc.list\"]}\n");

        // Однобайтовые огрызки молча отбрасываются.
        out.clear();
        for b in b"x\n\n" {
            channel.process_byte(*b, &mut out);
        }
        assert_eq!(out, b"");
    }

    #[test]
    fn overflow_drops_partial_frame() {
        let mut channel = Channel::builder().recv_capacity(8).build();
        let mut out = vec![];
        for b in b"0123456789abcdef\n" {
            channel.process_byte(*b, &mut out);
        }
        // Первые восемь байтов отброшены переполнением; кадром становится
        // только хвост, накопленный после сброса.
        assert_eq!(
            out,
            b"{\"error\":{\"code\":-32700,\"message\":\"9abcdef\"}}\n",
        );

        // Кадр, занявший буфер ровно до ёмкости, ещё диспетчеризуется:
        // сброс происходит только при попытке положить лишний байт.
        out.clear();
        for b in b"12345678\n" {
            channel.process_byte(*b, &mut out);
        }
        assert_eq!(
            out,
            b"{\"error\":{\"code\":-32700,\"message\":\"12345678\"}}\n",
        );
    }

    #[test]
    fn per_channel_registries_are_independent() {
        let mut c1 = Channel::new();
        let mut c2 = Channel::new();
        c1.export("foo", |req| {
            req.reply(None);
        });

        let req = "{\"id\": 1, \"method\": \"rpc.list\"}";
        assert_eq!(
            process_str(&mut c1, req),
            "{\"id\":1,\"result\":[\"foo\",\"rpc.list\"]}\n",
        );
        assert_eq!(
            process_str(&mut c2, req),
            "{\"id\":1,\"result\":[\"rpc.list\"]}\n",
        );
    }

    #[test]
    fn renamed_and_disabled_list_method() {
        let mut channel = Channel::builder().list_method("RPC.List").build();
        assert_eq!(
            process_str(&mut channel, "{\"id\":1,\"method\":\"RPC.List\"}"),
            "{\"id\":1,\"result\":[\"RPC.List\"]}\n",
        );

        let mut channel = Channel::builder().list_method("").build();
        assert_eq!(
            process_str(&mut channel, "{\"id\":1,\"method\":\"rpc.list\"}"),
            "{\"id\":1,\"error\":{\"code\":-32601,\"message\":\"method not \
             found\"}}\n",
        );
    }

    #[test]
    fn outbound_call_appends_newline() {
        let mut out = vec![];
        let n = call(
            &mut out,
            "{%Q:%d,%Q:%Q}",
            &[
                Arg::Quoted("id"),
                Arg::Int(1),
                Arg::Quoted("method"),
                Arg::Quoted("sum"),
            ],
        );
        assert_eq!(out, b"{\"id\":1,\"method\":\"sum\"}\n");
        assert_eq!(n, out.len());
    }

    #[test]
    fn replies_parse_as_json() {
        let mut channel = Channel::new();
        channel.export("foo", |req| {
            req.reply(Some(("{%Q:%g}", &[Arg::Quoted("x"), Arg::Double(1.23)])));
        });
        let got = process_str(
            &mut channel,
            "{\"id\":2,\"method\":\"foo\",\"params\":[]}",
        );
        let v: serde_json::Value =
            serde_json::from_str(got.trim_end()).expect("valid JSON");
        assert_eq!(v["id"], 2);
        assert_eq!(v["result"]["x"], 1.23);
    }

    #[test]
    fn string_ids_are_echoed_raw() {
        let mut channel = Channel::new();
        channel.export("e", |req| {
            req.reply_error(-32000, "boom", None);
        });
        assert_eq!(
            process_str(&mut channel, "{\"id\":\"k-1\",\"method\":\"e\"}"),
            "{\"id\":\"k-1\",\"error\":{\"code\":-32000,\"message\":\
             \"boom\"}}\n",
        );
    }
}
