//! Embedded HTML/CSS/JS frontend for the fintiva web dashboard.
//!
//! The whole single-page app is compiled into the binary. It routes on
//! `location.pathname` and talks only to the local `/api/*` endpoints.

/// The complete single-page app.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>FINTIVA</title>
<style>
:root {
  --bg: #f6f8f3;
  --surface: #ffffff;
  --border: #d9e0d2;
  --text: #1f2a1c;
  --text-muted: #6b7a66;
  --accent: #2f7d32;
  --accent-soft: #e3f1e0;
  --amber: #c98a12;
  --red: #c0392b;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
}
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: var(--font); background: var(--bg); color: var(--text); }
header {
  display: flex; align-items: center; justify-content: space-between;
  padding: 14px 28px; background: var(--surface); border-bottom: 1px solid var(--border);
}
header .brand { font-weight: 700; font-size: 20px; color: var(--accent); letter-spacing: 1px; }
nav a {
  margin-left: 18px; color: var(--text-muted); text-decoration: none; font-size: 14px;
}
nav a.active, nav a:hover { color: var(--accent); }
main { max-width: 1040px; margin: 28px auto; padding: 0 20px; }
.hero { text-align: center; padding: 60px 0 30px; }
.hero h1 { font-size: 34px; margin-bottom: 14px; }
.hero p { color: var(--text-muted); font-size: 17px; }
.pillars { display: grid; grid-template-columns: repeat(3, 1fr); gap: 18px; margin-top: 30px; }
.card {
  background: var(--surface); border: 1px solid var(--border);
  border-radius: var(--radius); padding: 20px;
}
.card h2 { font-size: 16px; margin-bottom: 12px; }
.pillars .card h2 { color: var(--accent); }
.grid2 { display: grid; grid-template-columns: 1fr 1fr; gap: 18px; }
form .row { display: flex; flex-direction: column; margin-bottom: 12px; }
form label { font-size: 13px; color: var(--text-muted); margin-bottom: 4px; }
form input {
  padding: 8px 10px; border: 1px solid var(--border); border-radius: 6px; font-size: 14px;
}
button {
  background: var(--accent); color: #fff; border: 0; border-radius: 6px;
  padding: 9px 18px; font-size: 14px; cursor: pointer;
}
button.secondary { background: var(--accent-soft); color: var(--accent); }
.muted { color: var(--text-muted); font-size: 13px; }
.empty { color: var(--text-muted); text-align: center; padding: 40px 0; }
.message { margin-top: 12px; font-size: 14px; }
.message.ok { color: var(--accent); }
.message.error { color: var(--red); }
svg text { font-size: 11px; fill: var(--text-muted); }
</style>
</head>
<body>
<header>
  <div class="brand">FINTIVA</div>
  <nav id="nav">
    <a href="/" data-link>Inicio</a>
    <a href="/dashboard" data-link>Dashboard</a>
    <a href="/gastos" data-link>Gastos</a>
    <a href="/cultivos" data-link>Cultivos</a>
    <a href="/parcelas" data-link>Parcelas</a>
    <a href="/login" data-link id="nav-login">Ingresar</a>
    <a href="#" id="nav-logout" style="display:none">Salir</a>
  </nav>
</header>
<main id="view"></main>

<script>
// ---------------------------------------------------------------------------
// API helpers
// ---------------------------------------------------------------------------
async function api(method, path, body) {
  const opts = { method, headers: {} };
  if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const data = await res.json().catch(() => ({}));
  return { status: res.status, data };
}

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({
    '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
  }[c]));
}

const view = () => document.getElementById('view');

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------
function navigate(path) {
  history.pushState({}, '', path);
  render();
}

document.addEventListener('click', e => {
  const link = e.target.closest('a[data-link]');
  if (!link) return;
  e.preventDefault();
  navigate(link.getAttribute('href'));
});
window.addEventListener('popstate', render);

document.getElementById('nav-logout').addEventListener('click', async e => {
  e.preventDefault();
  await api('POST', '/api/logout');
  navigate('/login');
});

async function refreshNav() {
  const { data } = await api('GET', '/api/session');
  document.getElementById('nav-login').style.display = data.logged_in ? 'none' : '';
  document.getElementById('nav-logout').style.display = data.logged_in ? '' : 'none';
  document.querySelectorAll('#nav a[data-link]').forEach(a =>
    a.classList.toggle('active', a.getAttribute('href') === location.pathname));
}

async function render() {
  refreshNav();
  switch (location.pathname) {
    case '/login': return renderLogin();
    case '/dashboard': return renderDashboard();
    case '/gastos':
    case '/cultivos':
    case '/parcelas': return renderForm(location.pathname.slice(1));
    default: return renderHome();
  }
}

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------
function renderHome() {
  view().innerHTML = `
    <section class="hero">
      <h1>Finanzas claras para el campo</h1>
      <p>Registra tus gastos, cultivos y parcelas, y mira cómo evoluciona tu producción.</p>
      <div class="pillars">
        <div class="card"><h2>Sembramos educación</h2>
          <p class="muted">Herramientas sencillas para llevar las cuentas de tu parcela.</p></div>
        <div class="card"><h2>Cultivamos confianza</h2>
          <p class="muted">Tus datos financieros ordenados y disponibles cuando los necesitas.</p></div>
        <div class="card"><h2>Cosechamos bienestar</h2>
          <p class="muted">Información para decidir mejor en cada temporada.</p></div>
      </div>
      <p style="margin-top:30px"><a href="/login" data-link><button>Ingresar</button></a></p>
    </section>`;
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------
function renderLogin() {
  view().innerHTML = `
    <div class="card" style="max-width:380px;margin:40px auto">
      <h2>Iniciar sesión</h2>
      <form id="login-form">
        <div class="row"><label>Nombre completo</label><input name="identificador" required></div>
        <div class="row"><label>Contraseña</label><input name="contrasena" type="password" required></div>
        <button type="submit">Ingresar</button>
        <div id="login-msg" class="message"></div>
      </form>
    </div>`;
  document.getElementById('login-form').addEventListener('submit', async e => {
    e.preventDefault();
    const fd = new FormData(e.target);
    const { status, data } = await api('POST', '/api/login', {
      identificador: fd.get('identificador'),
      contrasena: fd.get('contrasena'),
    });
    if (status === 200) {
      navigate('/dashboard');
    } else {
      const msg = document.getElementById('login-msg');
      msg.className = 'message error';
      msg.textContent = data.detail || data.error || 'Error al iniciar sesión';
    }
  });
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------
async function renderDashboard() {
  view().innerHTML = '<div class="empty">Cargando…</div>';
  const { data } = await api('GET', '/api/dashboard');
  const note = data.state === 'unidentified'
    ? '<p class="muted">No se pudo identificar al usuario de la sesión.</p>' : '';
  view().innerHTML = `
    ${note}
    <div class="grid2">
      <div class="card"><h2>Gastos por trimestre</h2><div id="chart-quarters"></div></div>
      <div class="card"><h2>Cultivos por parcela</h2><div id="chart-parcels"></div></div>
    </div>
    <p style="margin-top:14px"><button class="secondary" id="reload">Actualizar</button></p>`;
  document.getElementById('chart-quarters').innerHTML = lineChart(
    (data.quarterly_expenses || []).map(p => ({ label: p.period, value: p.total })));
  document.getElementById('chart-parcels').innerHTML = barChart(
    (data.parcel_crops || []).map(p => ({ label: p.parcel, value: p.crop_count })));
  document.getElementById('reload').addEventListener('click', async () => {
    await api('GET', '/api/dashboard?refresh=1');
    renderDashboard();
  });
}

const W = 440, H = 220, PAD = 34;

function scaleY(max) {
  return v => H - PAD - (max > 0 ? (v / max) * (H - 2 * PAD) : 0);
}

function lineChart(points) {
  if (!points.length) return '<div class="empty">Sin datos</div>';
  const max = Math.max(...points.map(p => p.value), 0);
  const y = scaleY(max);
  const step = points.length > 1 ? (W - 2 * PAD) / (points.length - 1) : 0;
  const xy = points.map((p, i) => [PAD + i * step, y(p.value)]);
  const path = xy.map(([x, yy], i) => (i ? 'L' : 'M') + x.toFixed(1) + ' ' + yy.toFixed(1)).join(' ');
  return `<svg viewBox="0 0 ${W} ${H}" width="100%">
    <line x1="${PAD}" y1="${H - PAD}" x2="${W - PAD}" y2="${H - PAD}" stroke="#d9e0d2"/>
    <path d="${path}" fill="none" stroke="#2f7d32" stroke-width="2"/>
    ${xy.map(([x, yy], i) => `
      <circle cx="${x}" cy="${yy}" r="3.5" fill="#2f7d32"><title>${esc(points[i].value)}</title></circle>
      <text x="${x}" y="${H - PAD + 16}" text-anchor="middle">${esc(points[i].label)}</text>`).join('')}
    <text x="${PAD}" y="${PAD - 10}">${esc(max.toLocaleString())}</text>
  </svg>`;
}

function barChart(points) {
  if (!points.length) return '<div class="empty">Sin datos</div>';
  const max = Math.max(...points.map(p => p.value), 0);
  const y = scaleY(max);
  const slot = (W - 2 * PAD) / points.length;
  const bw = Math.min(48, slot * 0.6);
  return `<svg viewBox="0 0 ${W} ${H}" width="100%">
    <line x1="${PAD}" y1="${H - PAD}" x2="${W - PAD}" y2="${H - PAD}" stroke="#d9e0d2"/>
    ${points.map((p, i) => {
      const x = PAD + i * slot + (slot - bw) / 2;
      const top = y(p.value);
      return `<rect x="${x}" y="${top}" width="${bw}" height="${H - PAD - top}" fill="#c98a12" rx="3">
          <title>${esc(p.value)}</title></rect>
        <text x="${x + bw / 2}" y="${H - PAD + 16}" text-anchor="middle">${esc(p.label)}</text>
        <text x="${x + bw / 2}" y="${top - 4}" text-anchor="middle">${esc(p.value)}</text>`;
    }).join('')}
  </svg>`;
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------
async function renderForm(kind) {
  const { status, data } = await api('GET', '/api/forms/' + kind);
  if (status !== 200) {
    view().innerHTML = `<div class="empty">${esc(data.error)}</div>`;
    return;
  }
  drawForm(kind, data.draft);
  if (kind === 'cultivos') loadParcels();
}

function drawForm(kind, draft, message, ok) {
  const rows = draft.fields.map(f => `
    <div class="row">
      <label>${esc(f.label)}</label>
      <input name="${esc(f.name)}" value="${esc(f.value)}"
        ${f.kind === 'number' ? 'inputmode="decimal"' : ''}>
    </div>`).join('');
  const parcel = kind === 'cultivos'
    ? '<div class="row"><label>Parcela</label><select id="parcel-select"></select></div>' : '';
  const msg = message
    ? `<div class="message ${ok ? 'ok' : 'error'}">${esc(message)}</div>` : '';
  view().innerHTML = `
    <div class="card" style="max-width:520px;margin:0 auto">
      <h2>${esc(draft.title)}</h2>
      <form id="entry-form">${parcel}${rows}<button type="submit">Registrar</button>${msg}</form>
    </div>`;
  document.getElementById('entry-form').addEventListener('submit', async e => {
    e.preventDefault();
    const fields = {};
    draft.fields.forEach(f => fields[f.name] = e.target.elements[f.name].value);
    const body = { fields };
    const select = document.getElementById('parcel-select');
    if (select && select.value) body.id_parcela = Number(select.value);
    const { data } = await api('POST', '/api/forms/' + kind, body);
    if (data.draft) {
      drawForm(kind, data.draft, data.success ? 'Registro guardado' : data.message, data.success);
      if (kind === 'cultivos') loadParcels();
    }
  });
}

async function loadParcels() {
  const select = document.getElementById('parcel-select');
  if (!select) return;
  const { data } = await api('GET', '/api/parcels');
  const items = data.items || [];
  select.innerHTML = items.length
    ? items.map(p => `<option value="${p.id_parcela}" ${p.id_parcela === data.default ? 'selected' : ''}>
        ${esc(p.nombre_parcela)}</option>`).join('')
    : `<option value="${esc(data.default)}">Parcela ${esc(data.default)}</option>`;
}

render();
</script>
</body>
</html>
"##;
