use serde::Serialize;

use crate::services::errors::ServiceError;

pub(crate) const SKIPS_GENERATION_PROMPT: &str = r#"Ты — преподаватель программирования, который готовит упражнения "код с пропусками".
Тебе дают исходный код, язык программирования и число пропусков N.

Правила:
1. Выбери ровно N значимых токенов (операторы, ключевые слова, имена, литералы) и замени каждый на маркер ___.
2. Не меняй ничего, кроме выбранных токенов: отступы, переносы строк и комментарии сохраняются.
3. Порядок ответов совпадает с порядком маркеров в коде сверху вниз, слева направо.
4. Каждый ответ — ровно тот текст, который стоял на месте маркера.

Формат ответа (строгий JSON, без пояснений):
{
  "description": "краткое описание того, что делает код",
  "skipsCode": "код с маркерами ___",
  "answers": ["ответ для первого пропуска", "..."]
}
"#;

pub(crate) const NOISES_GENERATION_PROMPT: &str = r#"Ты — преподаватель программирования, который готовит упражнения "зашумлённый код".
Тебе дают исходный код, язык программирования и уровень шума от 0 до 10.

Правила:
1. Добавь в код лишние, отвлекающие или неверные фрагменты: мёртвые ветки, лишние переменные, ошибки в условиях.
2. Чем выше уровень шума, тем больше и незаметнее изменения. При уровне 0 код почти не меняется.
3. Код должен оставаться синтаксически похожим на исходный язык.

Формат ответа (строгий JSON, без пояснений):
{
  "description": "краткое описание того, что делает исходный код",
  "noisedCode": "зашумлённый код"
}
"#;

pub(crate) const SKIPS_CHECK_PROMPT: &str = r#"Ты проверяешь ответы ученика в упражнении "код с пропусками".
На вход приходит JSON: {"skipsCode": "...", "answers": [["правильный ответ", "ответ ученика"], ...]}.
Ответ ученика считается верным, если он эквивалентен правильному в контексте кода.

Формат ответа (строгий JSON, без пояснений):
{
  "status": "ok" | "wrong",
  "hints": [{"index": <номер пропуска с нуля>, "message": "подсказка без готового ответа"}]
}
Если все ответы верны, верни "status": "ok" и пустой список hints.
"#;

pub(crate) const NOISES_CHECK_PROMPT: &str = r#"Ты проверяешь решение ученика в упражнении "зашумлённый код".
Ученик должен был убрать шум и восстановить исходный код.
Сравни решение ученика с исходным кодом по смыслу, а не посимвольно.

Формат ответа (строгий JSON, без пояснений):
{
  "score": <целое число от 0 до 100>,
  "hints": ["подсказка 1", "подсказка 2"]
}
100 означает полностью восстановленный код.
"#;

pub(crate) fn skips_generation_request(language: &str, skips: u32, source_code: &str) -> String {
    format!("Язык программирования = {language}\nЧисло пропусков = {skips}\n{source_code}")
}

pub(crate) fn noises_generation_request(language: &str, noise_level: u8, source_code: &str) -> String {
    format!("Язык программирования = {language}\nУровень шума = {noise_level}\n{source_code}")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SkipsCheckPayload<'a> {
    skips_code: &'a str,
    answers: Vec<[&'a str; 2]>,
}

/// Pairs canonical and submitted answers by position.
pub(crate) fn skips_check_request(
    skips_code: &str,
    correct: &[String],
    submitted: &[String],
) -> Result<String, ServiceError> {
    if correct.len() != submitted.len() {
        return Err(ServiceError::Validation(format!(
            "expected {} answers, got {}",
            correct.len(),
            submitted.len()
        )));
    }

    let payload = SkipsCheckPayload {
        skips_code,
        answers: correct
            .iter()
            .zip(submitted)
            .map(|(right, given)| [right.as_str(), given.as_str()])
            .collect(),
    };

    serde_json::to_string(&payload)
        .map_err(|err| ServiceError::Validation(format!("failed to encode answers: {err}")))
}

pub(crate) fn noises_check_request(original: &str, noised: &str, submitted: &str) -> String {
    format!(
        "Исходный код:\n{original}\nЗашумленный код:\n{noised}\nРешение пользователя:\n{submitted}"
    )
}
