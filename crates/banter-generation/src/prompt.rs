//! Prompt construction and localized scenario pools.

use banter_core::types::{GenerationMode, Language};

use crate::client::ChatMessage;

const BASE_IDENTITY_EN: &str = "You are a player in a Rainbow Six Siege match. \
Adopt the vernacular of a digital native gamer (informal, rapid-fire, low-effort typing). \
Write like a stream of consciousness or Twitch chat. \
Never use formal greetings like 'Hey team' or 'Hello'.";

const BASE_IDENTITY_PT: &str = "Você é um jogador em uma partida de Rainbow Six Siege. \
Use o vocabulário de um gamer nativo digital (informal, rápido, digitação preguiçosa). \
Escreva como um fluxo de consciência ou chat da Twitch. \
Nunca use saudações formais como 'Oi time' ou 'Olá'.";

const TEXT_GUIDE_EN: &str = "Write a single, short in-game chat message (under 120 chars). \
Use text-based emoticons if needed, but never emojis. \
Avoid punctuation and uppercase letters unless for emphasis.";

const TEXT_GUIDE_PT: &str = "Escreva uma única mensagem curta de chat do jogo (menos de 120 caracteres). \
Use emoticons de texto se precisar, mas nunca emojis. \
Evite pontuação e letras maiúsculas, a não ser para dar ênfase.";

const VOICE_GUIDE_EN: &str = "Write one short line to be spoken aloud over voice chat (one or two sentences). \
Write it the way people talk: no emoticons, no hashtags, nothing that cannot be pronounced.";

const VOICE_GUIDE_PT: &str = "Escreva uma fala curta para ser dita em voz alta no chat de voz (uma ou duas frases). \
Escreva como as pessoas falam: sem emoticons, sem hashtags, nada que não possa ser pronunciado.";

const PERSONA_EN: &str = "Your response must strictly follow the style of the assigned Persona.";

const PERSONA_PT: &str = "Sua resposta deve seguir rigorosamente o estilo da Persona atribuída.";

const OBSERVED_EN: &str = "The match situation below was observed directly from the game screen. \
Trust this observed data over any assumption and react to exactly what it describes.";

const OBSERVED_PT: &str = "A situação da partida abaixo foi observada diretamente na tela do jogo. \
Confie nesses dados observados acima de qualquer suposição e reaja exatamente ao que eles descrevem.";

const SCENARIOS_EN: &[&str] = &[
    "We just won the round comfortably.",
    "We lost the round but it was close.",
    "We got destroyed this round.",
    "A teammate just clutched a 1v3.",
    "Someone on our team failed a 1v1.",
    "The match just started.",
    "It's match point for us.",
    "It's match point for the enemy.",
    "A teammate accidentally team-killed.",
    "The enemy team is trash talking.",
    "It's quiet, nobody is talking.",
    "We are rushing the objective.",
    "We are camping the objective.",
    "A teammate is AFK.",
    "Someone made a funny mistake.",
];

const SCENARIOS_PT: &[&str] = &[
    "Acabamos de ganhar o round com folga.",
    "Perdemos o round, mas foi por pouco.",
    "Fomos destruídos neste round.",
    "Um aliado acabou de fazer um clutch 1v3.",
    "Alguém do nosso time perdeu um 1v1.",
    "A partida acabou de começar.",
    "É match point para nós.",
    "É match point para o inimigo.",
    "Um aliado matou alguém do próprio time sem querer.",
    "O time inimigo está provocando no chat.",
    "Está tudo quieto, ninguém está falando.",
    "Estamos correndo para o objetivo.",
    "Estamos segurando o objetivo.",
    "Um aliado está AFK.",
    "Alguém cometeu um erro engraçado.",
];

/// Default scenario pool for `language`.
pub fn scenarios(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => SCENARIOS_EN,
        Language::Pt => SCENARIOS_PT,
    }
}

/// System instruction: identity, mode guide, persona enforcement, and, for
/// observation-grounded requests, the instruction to trust the observation.
pub fn system_prompt(
    language: Language,
    mode: GenerationMode,
    persona_style: &str,
    observation_grounded: bool,
) -> String {
    let (identity, guide, enforce, observed, style_label) = match (language, mode) {
        (Language::En, GenerationMode::Text) => {
            (BASE_IDENTITY_EN, TEXT_GUIDE_EN, PERSONA_EN, OBSERVED_EN, "Persona/Style")
        }
        (Language::En, GenerationMode::Voice) => {
            (BASE_IDENTITY_EN, VOICE_GUIDE_EN, PERSONA_EN, OBSERVED_EN, "Persona/Style")
        }
        (Language::Pt, GenerationMode::Text) => {
            (BASE_IDENTITY_PT, TEXT_GUIDE_PT, PERSONA_PT, OBSERVED_PT, "Persona/Estilo")
        }
        (Language::Pt, GenerationMode::Voice) => {
            (BASE_IDENTITY_PT, VOICE_GUIDE_PT, PERSONA_PT, OBSERVED_PT, "Persona/Estilo")
        }
    };

    let mut prompt = format!(
        "{} {} {}\n\n{}: {}",
        identity, guide, enforce, style_label, persona_style
    );
    if observation_grounded {
        prompt.push_str("\n\n");
        prompt.push_str(observed);
    }
    prompt
}

/// User instruction filled with the context scenario.
pub fn user_prompt(language: Language, context: &str) -> String {
    match language {
        Language::En => format!(
            "Current Match Situation: {}\nWrite a message reacting to this situation.",
            context
        ),
        Language::Pt => format!(
            "Situação Atual da Partida: {}\nEscreva uma mensagem reagindo a essa situação.",
            context
        ),
    }
}

/// System turn, then each history line as a prior assistant turn (oldest
/// first), then the user turn.
pub fn build_messages(system: String, history: &[String], user: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().map(|line| ChatMessage::assistant(line.as_str())));
    messages.push(ChatMessage::user(user));
    messages
}
